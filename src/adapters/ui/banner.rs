//! Startup banner: "ENERGY PULSE" in figlet's standard font with a flame gradient.

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

/// Ember red (#ff3b1f).
const EMBER: (u8, u8, u8) = (0xff, 0x3b, 0x1f);
/// Gas-flame blue (#1fa2ff).
const FLAME_BLUE: (u8, u8, u8) = (0x1f, 0xa2, 0xff);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let mix = |x: u8, y: u8| (f64::from(x) * (1.0 - t) + f64::from(y) * t).round() as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn banner_art(title: &str) -> String {
    FIGfont::standard()
        .ok()
        .and_then(|font| font.convert(title).map(|fig| fig.to_string()))
        .unwrap_or_else(|| format!("{}\n", title))
}

pub fn print_welcome(title: &str) {
    let mut out = stdout();
    let art = banner_art(&title.to_uppercase());
    let lines: Vec<&str> = art.lines().filter(|l| !l.trim().is_empty()).collect();
    let total = lines.len().max(1);

    for (i, line) in lines.iter().enumerate() {
        let t = if total <= 1 {
            1.0
        } else {
            i as f64 / (total - 1) as f64
        };
        let (r, g, b) = lerp_rgb(EMBER, FLAME_BLUE, t);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
        let _ = out.execute(ResetColor);
    }

    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: FLAME_BLUE.0,
        g: FLAME_BLUE.1,
        b: FLAME_BLUE.2,
    }));
    let _ = out.execute(Print(format!("v{}\r\n", env!("CARGO_PKG_VERSION"))));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}
