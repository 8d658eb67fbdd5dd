//! Theme colors, with optional overrides from the config file

use ratatui::style::Color;

use crate::config::ThemeConfig;

/// Theme colors for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,      // Focused borders, running display
    pub warning: Color,     // Paused display, status messages
    pub danger: Color,      // Finished display, last seconds
    pub text: Color,        // Primary text
    pub text_dim: Color,    // Hints, placeholder
    pub inactive: Color,    // Unfocused borders
    pub header: Color,      // Title and help headings
    pub bg_selected: Color, // Focused button background
}

impl Default for Theme {
    fn default() -> Self {
        // Catppuccin-inspired
        Self {
            accent: Color::Rgb(250, 179, 135),
            warning: Color::Rgb(249, 226, 175),
            danger: Color::Rgb(243, 139, 168),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(243, 139, 168),
            bg_selected: Color::Rgb(69, 71, 90),
        }
    }
}

impl Theme {
    /// Build the theme from defaults plus any configured overrides.
    /// Unparseable colors are logged and skipped.
    pub fn from_config(config: &ThemeConfig) -> Self {
        let mut theme = Self::default();

        let overrides = [
            (&config.accent, &mut theme.accent, "accent"),
            (&config.warning, &mut theme.warning, "warning"),
            (&config.danger, &mut theme.danger, "danger"),
            (&config.text, &mut theme.text, "text"),
            (&config.text_dim, &mut theme.text_dim, "text_dim"),
            (&config.inactive, &mut theme.inactive, "inactive"),
        ];

        for (value, slot, name) in overrides {
            let Some(value) = value else { continue };
            match Self::parse_hex_color(value) {
                Some(color) => *slot = color,
                None => tracing::warn!("Ignoring invalid theme color {} = {:?}", name, value),
            }
        }

        // Headings follow danger, as in the default palette
        theme.header = theme.danger;
        theme
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}
