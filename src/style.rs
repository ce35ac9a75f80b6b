use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::PlotError;

/// File name of the companion style table looked up beside the executable.
pub const STYLE_TABLE_FILE: &str = "tests.json";

/// Normalized position below which a bar counts as fast.
pub const FAST_BELOW: f64 = 0.05;
/// Normalized position above which a bar counts as slow.
pub const SLOW_ABOVE: f64 = 0.80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Ten-color cycle addressed as `C0`..`C9`.
pub const CYCLE: [Rgb; 10] = [
    Rgb(0x1f, 0x77, 0xb4),
    Rgb(0xff, 0x7f, 0x0e),
    Rgb(0x2c, 0xa0, 0x2c),
    Rgb(0xd6, 0x27, 0x28),
    Rgb(0x94, 0x67, 0xbd),
    Rgb(0x8c, 0x56, 0x4b),
    Rgb(0xe3, 0x77, 0xc2),
    Rgb(0x7f, 0x7f, 0x7f),
    Rgb(0xbc, 0xbd, 0x22),
    Rgb(0x17, 0xbe, 0xcf),
];

fn color_code(c: char) -> Option<Rgb> {
    match c {
        'b' => Some(Rgb(0, 0, 255)),
        'g' => Some(Rgb(0, 128, 0)),
        'r' => Some(Rgb(255, 0, 0)),
        'c' => Some(Rgb(0, 191, 191)),
        'm' => Some(Rgb(191, 0, 191)),
        'y' => Some(Rgb(191, 191, 0)),
        'k' => Some(Rgb(0, 0, 0)),
        'w' => Some(Rgb(255, 255, 255)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Point,
    Pixel,
    Circle,
    Cross,
    Plus,
    Triangle,
}

impl Marker {
    fn from_code(c: char) -> Option<Marker> {
        match c {
            '.' => Some(Marker::Point),
            ',' => Some(Marker::Pixel),
            'o' => Some(Marker::Circle),
            'x' => Some(Marker::Cross),
            '+' => Some(Marker::Plus),
            '^' => Some(Marker::Triangle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDash {
    Solid,
    Dashed,
    DashDot,
    Dotted,
}

/// Color, marker and line-dash combination for one line series, written
/// compactly as e.g. `r.-` or `C3,--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleToken {
    pub color: Rgb,
    pub marker: Option<Marker>,
    pub line: Option<LineDash>,
}

impl FromStr for StyleToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut color = None;
        let mut marker = None;
        let mut line = None;

        let mut rest = s;
        while let Some(c) = rest.chars().next() {
            let dash = DASHES.iter().find(|(prefix, _)| rest.starts_with(prefix));

            let consumed = if let Some((prefix, dash)) = dash {
                set_once(&mut line, *dash, "line style", s)?;
                prefix.len()
            } else if let Some(index) = cycle_index(rest) {
                set_once(&mut color, CYCLE[index], "color", s)?;
                2
            } else if let Some(rgb) = color_code(c) {
                set_once(&mut color, rgb, "color", s)?;
                1
            } else if let Some(m) = Marker::from_code(c) {
                set_once(&mut marker, m, "marker", s)?;
                1
            } else {
                return Err(format!("unrecognized character {:?} in style {:?}", c, s));
            };
            rest = &rest[consumed..];
        }

        if marker.is_none() && line.is_none() {
            line = Some(LineDash::Solid);
        }

        Ok(StyleToken {
            color: color.unwrap_or(CYCLE[0]),
            marker,
            line,
        })
    }
}

static DASHES: [(&str, LineDash); 4] = [
    ("--", LineDash::Dashed),
    ("-.", LineDash::DashDot),
    ("-", LineDash::Solid),
    (":", LineDash::Dotted),
];

fn cycle_index(s: &str) -> Option<usize> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some('C'), Some(d)) => d.to_digit(10).map(|d| d as usize),
        _ => None,
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, what: &str, token: &str) -> Result<(), String> {
    if slot.is_some() {
        return Err(format!("{} given twice in style {:?}", what, token));
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StyleEntry {
    name: String,
    fmt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStyle {
    /// Legend text.
    pub name: String,
    pub token: StyleToken,
}

/// Series identifier to display name and style token, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    styles: IndexMap<String, SeriesStyle>,
}

const BUILTIN: [(&str, &str); 10] = [
    ("h0", "r.-"),
    ("h1", "g.-"),
    ("h2", "b.-"),
    ("h3", "c.-"),
    ("h4", "m.-"),
    ("h5", "r,--"),
    ("h6", "g,--"),
    ("h7", "b,--"),
    ("h8", "c,--"),
    ("h9", "m,--"),
];

impl StyleTable {
    /// The fixed `h0`..`h9` table, each series named by its identifier.
    pub fn builtin() -> StyleTable {
        let styles = BUILTIN
            .iter()
            .map(|(id, fmt)| {
                let token = fmt.parse::<StyleToken>().expect("built-in style tokens are valid");
                let style = SeriesStyle {
                    name: id.to_string(),
                    token,
                };
                (id.to_string(), style)
            })
            .collect();
        StyleTable { styles }
    }

    /// `tests.json` in the directory holding the running executable.
    pub fn default_path() -> Result<PathBuf, PlotError> {
        let exe = std::env::current_exe().map_err(|e| PlotError::config(STYLE_TABLE_FILE, e))?;
        let dir = exe
            .parent()
            .ok_or_else(|| PlotError::config(&exe, "executable has no parent directory"))?;
        Ok(dir.join(STYLE_TABLE_FILE))
    }

    /// Loads a table from JSON, or from YAML when the extension says so.
    pub fn load(path: &Path) -> Result<StyleTable, PlotError> {
        let text = fs::read_to_string(path).map_err(|e| PlotError::config(path, e))?;
        let yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let entries: IndexMap<String, StyleEntry> = if yaml {
            serde_yaml::from_str(&text).map_err(|e| PlotError::config(path, e))?
        } else {
            serde_json::from_str(&text).map_err(|e| PlotError::config(path, e))?
        };
        let table = StyleTable::from_entries(entries).map_err(|e| PlotError::config(path, e))?;
        debug!(path = %path.display(), styles = table.len(), "loaded style table");
        Ok(table)
    }

    fn from_entries(entries: IndexMap<String, StyleEntry>) -> Result<StyleTable, String> {
        let styles = entries
            .into_iter()
            .map(|(id, entry)| -> Result<(String, SeriesStyle), String> {
                let token = entry
                    .fmt
                    .parse::<StyleToken>()
                    .map_err(|e| format!("series `{}`: {}", id, e))?;
                Ok((
                    id,
                    SeriesStyle {
                        name: entry.name,
                        token,
                    },
                ))
            })
            .collect::<Result<_, String>>()?;
        Ok(StyleTable { styles })
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn lookup(&self, series_id: &str) -> Result<&SeriesStyle, PlotError> {
        self.styles
            .get(series_id)
            .ok_or_else(|| PlotError::UnknownSeries(series_id.to_owned()))
    }
}

/// Min-max normalized position of `y`, defined as 0 when all values are equal.
pub fn percentile(y: f64, min_y: f64, max_y: f64) -> f64 {
    if max_y == min_y {
        0.
    } else {
        (y - min_y) / (max_y - min_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Fast,
    Neutral,
    Slow,
}

impl Rank {
    pub fn classify(p: f64) -> Rank {
        if p < FAST_BELOW {
            Rank::Fast
        } else if p > SLOW_ABOVE {
            Rank::Slow
        } else {
            Rank::Neutral
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            Rank::Fast => Rgb(0, 128, 0),
            Rank::Slow => Rgb(255, 0, 0),
            Rank::Neutral => CYCLE[0],
        }
    }
}

/// Ranks every value against the range of the whole set.
pub fn rank_all(values: &[f64]) -> Vec<Rank> {
    let min_y = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|&y| Rank::classify(percentile(y, min_y, max_y)))
        .collect()
}

/// How a chart colors its series or bars.
#[derive(Debug, Clone, Copy)]
pub enum VisualEncoding<'a> {
    /// Fixed style per series identifier; unknown identifiers are rejected.
    Table(&'a StyleTable),
    /// Color from each value's rank within the chart.
    Rank,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn parses_marker_line_color_tokens() {
        let token: StyleToken = "r.-".parse().unwrap();
        assert_eq!(
            token,
            StyleToken {
                color: Rgb(255, 0, 0),
                marker: Some(Marker::Point),
                line: Some(LineDash::Solid),
            }
        );

        let token: StyleToken = "m,--".parse().unwrap();
        assert_eq!(token.marker, Some(Marker::Pixel));
        assert_eq!(token.line, Some(LineDash::Dashed));

        let token: StyleToken = "-.C3".parse().unwrap();
        assert_eq!(token.color, CYCLE[3]);
        assert_eq!(token.line, Some(LineDash::DashDot));
    }

    #[test]
    fn marker_alone_draws_no_line() {
        let token: StyleToken = "ob".parse().unwrap();
        assert_eq!(token.marker, Some(Marker::Circle));
        assert_eq!(token.line, None);
    }

    #[test]
    fn empty_token_is_solid_default_color() {
        let token: StyleToken = "".parse().unwrap();
        assert_eq!(token.color, CYCLE[0]);
        assert_eq!(token.line, Some(LineDash::Solid));
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!("rq".parse::<StyleToken>().is_err());
        assert!("rg".parse::<StyleToken>().is_err());
        assert!("--:".parse::<StyleToken>().is_err());
    }

    #[test]
    fn builtin_table_covers_h0_to_h9() {
        let table = StyleTable::builtin();
        assert_eq!(table.len(), 10);
        let h7 = table.lookup("h7").unwrap();
        assert_eq!(h7.name, "h7");
        assert_eq!(h7.token.color, Rgb(0, 0, 255));
        assert_eq!(h7.token.line, Some(LineDash::Dashed));
    }

    #[test]
    fn unknown_series_is_rejected() {
        let table = StyleTable::builtin();
        assert!(matches!(
            table.lookup("h10"),
            Err(PlotError::UnknownSeries(id)) if id == "h10"
        ));
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("benchplot-style-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn loads_json_table_ignoring_extra_fields() {
        let path = temp_file(
            "tests.json",
            r#"{
                "h0": { "name": "h0: Reduce", "fmt": "r.-", "text": "old" },
                "h6": { "name": "h6: Frozen", "fmt": "g,--" }
            }"#,
        );
        let table = StyleTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("h0").unwrap().name, "h0: Reduce");
        assert_eq!(table.lookup("h6").unwrap().token.marker, Some(Marker::Pixel));
    }

    #[test]
    fn loads_yaml_table() {
        let path = temp_file("styles.yaml", "h2:\n  name: Match\n  fmt: b.-\n");
        let table = StyleTable::load(&path).unwrap();
        assert_eq!(table.lookup("h2").unwrap().token.color, Rgb(0, 0, 255));
    }

    #[test]
    fn bad_table_is_config_error() {
        let missing = std::env::temp_dir().join("benchplot-no-such-table.json");
        assert!(matches!(
            StyleTable::load(&missing),
            Err(PlotError::ConfigLoad { .. })
        ));

        let garbled = temp_file("garbled.json", "{ not json");
        assert!(matches!(
            StyleTable::load(&garbled),
            Err(PlotError::ConfigLoad { .. })
        ));

        let bad_fmt = temp_file("bad-fmt.json", r#"{ "h0": { "name": "x", "fmt": "??" } }"#);
        assert!(matches!(
            StyleTable::load(&bad_fmt),
            Err(PlotError::ConfigLoad { .. })
        ));
    }

    #[test]
    fn rank_boundaries() {
        assert_eq!(Rank::classify(percentile(4., 0., 100.)), Rank::Fast);
        assert_eq!(Rank::classify(percentile(5., 0., 100.)), Rank::Neutral);
        assert_eq!(Rank::classify(percentile(80., 0., 100.)), Rank::Neutral);
        assert_eq!(Rank::classify(percentile(81., 0., 100.)), Rank::Slow);
    }

    #[test]
    fn equal_values_rank_fast() {
        assert_eq!(rank_all(&[3., 3., 3.]), [Rank::Fast; 3]);
    }

    #[test]
    fn ranks_against_whole_set() {
        assert_eq!(
            rank_all(&[0., 4., 50., 100.]),
            [Rank::Fast, Rank::Fast, Rank::Neutral, Rank::Slow]
        );
    }

    proptest! {
        #[test]
        fn percentile_is_unit_interval(values in proptest::collection::vec(-1e9f64..1e9, 1..32)) {
            let min_y = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max_y = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            for &y in &values {
                let p = percentile(y, min_y, max_y);
                prop_assert!((0. ..=1.).contains(&p));
            }
            let ranks = rank_all(&values);
            prop_assert!(ranks.iter().any(|r| *r == Rank::Fast));
        }
    }
}
