//! The fixed list of font families published in a Nerd Fonts release.

/// Release the catalog was taken from.
pub const NERD_FONTS_RELEASE: &str = "v3.0.2";

pub const NERD_FONTS_BASE_URL: &str = "https://github.com/ryanoasis/nerd-fonts/releases/download";

pub const FONTS: &[&str] = &[
    "3270",
    "Agave",
    "AnonymousPro",
    "Arimo",
    "AurulentSansMono",
    "BigBlueTerminal",
    "BitstreamVeraSansMono",
    "CascadiaCode",
    "CodeNewRoman",
    "ComicShannsMono",
    "Cousine",
    "DaddyTimeMono",
    "DejaVuSansMono",
    "DroidSansMono",
    "EnvyCodeR",
    "FantasqueSansMono",
    "FiraCode",
    "FiraMono",
    "Go-Mono",
    "Gohu",
    "Hack",
    "Hasklig",
    "HeavyData",
    "Hermit",
    "iA-Writer",
    "IBMPlexMono",
    "Inconsolata",
    "InconsolataGo",
    "InconsolataLGC",
    "Iosevka",
    "IosevkaTerm",
    "JetBrainsMono",
    "Lekton",
    "LiberationMono",
    "Lilex",
    "Meslo",
    "Monofur",
    "Monoid",
    "Mononoki",
    "MPlus",
    "NerdFontsSymbolsOnly",
    "Noto",
    "OpenDyslexic",
    "Overpass",
    "ProFont",
    "ProggyClean",
    "RobotoMono",
    "ShareTechMono",
    "SourceCodePro",
    "SpaceMono",
    "Terminus",
    "Tinos",
    "Ubuntu",
    "UbuntuMono",
    "VictorMono",
];

pub fn is_known(name: &str) -> bool {
    FONTS.contains(&name)
}

/// Catalog entries starting with `prefix`, in catalog order.
pub fn complete(prefix: &str) -> impl Iterator<Item = &'static str> + '_ {
    FONTS.iter().copied().filter(move |f| f.starts_with(prefix))
}

/// User input split against the catalog.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub valid: Vec<String>,
    pub unknown: Vec<String>,
}

/// Split whitespace-separated input into known and unknown names.
/// Known names are kept once, in first-seen order; every unknown token is reported.
pub fn partition(input: &str) -> Selection {
    let mut selection = Selection::default();
    for token in input.split_whitespace() {
        if !is_known(token) {
            selection.unknown.push(token.to_string());
        } else if !selection.valid.iter().any(|t| t == token) {
            selection.valid.push(token.to_string());
        }
    }
    selection
}
