use ratatui::style::Color;

// Terminal "white" is often grey; titles use true white
pub(crate) const PURE_WHITE: Color = Color::Rgb(255, 255, 255);
