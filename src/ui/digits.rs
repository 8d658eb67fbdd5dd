//! Block-letter rendering of the `MM:SS` display

const HEIGHT: usize = 5;

fn glyph(c: char) -> Option<[&'static str; HEIGHT]> {
    let rows = match c {
        '0' => ["███", "█ █", "█ █", "█ █", "███"],
        '1' => [" █ ", "██ ", " █ ", " █ ", "███"],
        '2' => ["███", "  █", "███", "█  ", "███"],
        '3' => ["███", "  █", "███", "  █", "███"],
        '4' => ["█ █", "█ █", "███", "  █", "  █"],
        '5' => ["███", "█  ", "███", "  █", "███"],
        '6' => ["███", "█  ", "███", "█ █", "███"],
        '7' => ["███", "  █", "  █", "  █", "  █"],
        '8' => ["███", "█ █", "███", "█ █", "███"],
        '9' => ["███", "█ █", "███", "  █", "███"],
        ':' => [" ", "█", " ", "█", " "],
        _ => return None,
    };
    Some(rows)
}

/// Render `s` as five rows of block glyphs, or `None` for unsupported characters
pub fn render(s: &str) -> Option<Vec<String>> {
    let glyphs = s.chars().map(glyph).collect::<Option<Vec<_>>>()?;

    let rows = (0..HEIGHT)
        .map(|row| {
            glyphs
                .iter()
                .map(|g| g[row])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    Some(rows)
}
