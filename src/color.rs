#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgba = Rgba::opaque(0x00, 0x00, 0x00);
    pub const RED: Rgba = Rgba::opaque(0xFF, 0x00, 0x00);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Parse `#RGB`, `#ARGB`, `#RRGGBB` or `#AARRGGBB`. The `#` is optional.
    pub fn parse_hex(code: &str) -> Option<Self> {
        let hex = code.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 => Some(Self::opaque(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self {
                a: nibble(0)?,
                r: nibble(1)?,
                g: nibble(2)?,
                b: nibble(3)?,
            }),
            6 => Some(Self::opaque(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self {
                a: byte(0)?,
                r: byte(2)?,
                g: byte(4)?,
                b: byte(6)?,
            }),
            _ => None,
        }
    }

    /// Luma approximation, alpha ignored.
    pub fn brightness(&self) -> f64 {
        0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64
    }

    /// White text on dark backgrounds, black text on light ones.
    pub fn readable_foreground(&self) -> Rgba {
        if self.brightness() < 128.0 {
            Rgba::WHITE
        } else {
            Rgba::BLACK
        }
    }
}
