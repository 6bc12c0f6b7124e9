//! User settings, each persisted under its own key.
//!
//! Settings have no relationship to the source buffers. Every value is stored
//! as a plain string; anything unrecognised on load reads as the default.

use crate::error::Result;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};

pub const THEME_KEY: &str = "theme";
pub const FONT_SIZE_KEY: &str = "fontSize";
pub const AUTO_RUN_KEY: &str = "autoRun";
pub const SYNTAX_THEME_KEY: &str = "syntaxTheme";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Editor font size, stored by its utility-class name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontSize {
    #[serde(rename = "text-sm")]
    Small,
    #[default]
    #[serde(rename = "text-base")]
    Base,
    #[serde(rename = "text-lg")]
    Large,
}

impl FontSize {
    pub fn as_str(self) -> &'static str {
        match self {
            FontSize::Small => "text-sm",
            FontSize::Base => "text-base",
            FontSize::Large => "text-lg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text-sm" => Some(FontSize::Small),
            "text-base" => Some(FontSize::Base),
            "text-lg" => Some(FontSize::Large),
            _ => None,
        }
    }

    /// Pixel size handed to the code editor widget.
    pub fn editor_px(self) -> u8 {
        match self {
            FontSize::Small => 12,
            FontSize::Base => 14,
            FontSize::Large => 16,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntaxTheme {
    #[default]
    Twilight,
    Monokai,
    Github,
    Dracula,
}

impl SyntaxTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            SyntaxTheme::Twilight => "twilight",
            SyntaxTheme::Monokai => "monokai",
            SyntaxTheme::Github => "github",
            SyntaxTheme::Dracula => "dracula",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "twilight" => Some(SyntaxTheme::Twilight),
            "monokai" => Some(SyntaxTheme::Monokai),
            "github" => Some(SyntaxTheme::Github),
            "dracula" => Some(SyntaxTheme::Dracula),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: Theme,
    pub font_size: FontSize,
    pub auto_run: bool,
    pub syntax_theme: SyntaxTheme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font_size: FontSize::default(),
            auto_run: true,
            syntax_theme: SyntaxTheme::default(),
        }
    }
}

impl Settings {
    pub fn load(store: &impl KeyValueStore) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(theme) = store.get(THEME_KEY)?.as_deref().and_then(Theme::parse) {
            settings.theme = theme;
        }
        if let Some(size) = store.get(FONT_SIZE_KEY)?.as_deref().and_then(FontSize::parse) {
            settings.font_size = size;
        }
        // Only the literal "true" enables auto-run once a value is stored.
        if let Some(auto) = store.get(AUTO_RUN_KEY)? {
            settings.auto_run = auto == "true";
        }
        if let Some(syntax) = store
            .get(SYNTAX_THEME_KEY)?
            .as_deref()
            .and_then(SyntaxTheme::parse)
        {
            settings.syntax_theme = syntax;
        }

        Ok(settings)
    }

    pub fn set_theme(&mut self, theme: Theme, store: &mut impl KeyValueStore) -> Result<()> {
        self.theme = theme;
        store.set(THEME_KEY, theme.as_str())
    }

    pub fn set_font_size(&mut self, size: FontSize, store: &mut impl KeyValueStore) -> Result<()> {
        self.font_size = size;
        store.set(FONT_SIZE_KEY, size.as_str())
    }

    pub fn set_auto_run(&mut self, enabled: bool, store: &mut impl KeyValueStore) -> Result<()> {
        self.auto_run = enabled;
        store.set(AUTO_RUN_KEY, if enabled { "true" } else { "false" })
    }

    pub fn set_syntax_theme(
        &mut self,
        theme: SyntaxTheme,
        store: &mut impl KeyValueStore,
    ) -> Result<()> {
        self.syntax_theme = theme;
        store.set(SYNTAX_THEME_KEY, theme.as_str())
    }
}
