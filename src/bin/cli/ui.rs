use nu_ansi_term::{Color, Style};
use std::fmt::Display;
use std::io::IsTerminal;

use locality_consolidator::config::ColorChoice;
use locality_consolidator::{CachedLocality, LocalityMatch, PhoneticSubset};

/// Which part of a name a highlighted span came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpanKind {
    Phonetic,
    Synonym,
    Excluded,
}

pub struct Ui {
    palette: Palette,
    paint: bool,
}

impl Ui {
    pub fn new(color: ColorChoice) -> Self {
        let paint = match color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::stdout().is_terminal(),
        };

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let palette = if paint {
            Palette::dark()
        } else {
            Palette::plain()
        };
        Self { palette, paint }
    }

    pub fn spacer(&self) {
        println!();
    }

    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(String, String)> = rows
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        if rows.is_empty() {
            return;
        }

        self.heading(title);
        let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows {
            if self.paint {
                println!(
                    "  {} {}",
                    self.palette.key.paint(format!("{key:>key_width$}:")),
                    self.palette.value.paint(value)
                );
            } else {
                println!("  {key:>key_width$}: {value}");
            }
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entries: Vec<String> = entries.into_iter().collect();
        if entries.is_empty() {
            return;
        }
        self.heading(title);
        for entry in entries {
            if self.paint {
                println!("  {} {entry}", self.palette.bullet.paint("•"));
            } else {
                println!("  - {entry}");
            }
        }
    }

    pub fn info(&self, message: &str) {
        let prefix = if self.paint {
            self.palette.info.paint(INFO_ICON)
        } else {
            Style::new().paint(INFO_ICON)
        };
        println!("{prefix} {message}");
    }

    pub fn warn(&self, message: &str) {
        let prefix = if self.paint {
            self.palette.warn.paint(WARNING_ICON)
        } else {
            Style::new().paint(WARNING_ICON)
        };
        eprintln!("{prefix} {message}");
    }

    /// Prints one candidate pair with its matched spans marked.
    pub fn locality_match(&self, ordinal: usize, found: &LocalityMatch) {
        self.heading(&format!(
            "match {ordinal}: locality {} ~ locality {}",
            found.base.locality_id, found.test.locality_id
        ));
        let mut base_spans = Vec::new();
        let mut test_spans = Vec::new();
        for phonetic in &found.phonetic_matches {
            let kind = if phonetic.synonymous {
                SpanKind::Synonym
            } else {
                SpanKind::Phonetic
            };
            base_spans.extend(phonetic.base_subsets.iter().filter_map(|s| span(s, kind)));
            test_spans.extend(phonetic.test_subsets.iter().filter_map(|s| span(s, kind)));
        }
        for pair in &found.excluded_pairs {
            base_spans.extend(span(&pair.base_subset, SpanKind::Excluded));
            test_spans.extend(span(&pair.test_subset, SpanKind::Excluded));
        }
        self.locality_line("base", &found.base, &base_spans);
        self.locality_line("test", &found.test, &test_spans);
        for phonetic in &found.phonetic_matches {
            let marker = if phonetic.synonymous { " (synonym)" } else { "" };
            println!("        {}{marker}", phonetic.sorted_phonetic_series);
        }
    }

    fn locality_line(
        &self,
        label: &str,
        locality: &CachedLocality,
        spans: &[(usize, usize, SpanKind)],
    ) {
        let name = self.highlight(&locality.name, spans);
        let key = if self.paint {
            self.palette.key.paint(format!("{label:>6}:")).to_string()
        } else {
            format!("{label:>6}:")
        };
        println!("  {key} {name}  [region {}]", locality.region_id);
    }

    /// Renders `name` with each `(start, end)` byte span styled; spans that
    /// overlap an earlier one are skipped.
    pub fn highlight(&self, name: &str, spans: &[(usize, usize, SpanKind)]) -> String {
        let mut ordered: Vec<&(usize, usize, SpanKind)> = spans.iter().collect();
        ordered.sort_by_key(|(start, end, _)| (*start, *end));
        let mut rendered = String::with_capacity(name.len() + spans.len() * 8);
        let mut cursor = 0;
        for &(start, end, kind) in ordered {
            let usable = start >= cursor
                && start <= end
                && name.is_char_boundary(start)
                && name.is_char_boundary(end);
            if !usable {
                continue;
            }
            rendered.push_str(&name[cursor..start]);
            let text = &name[start..end];
            if self.paint {
                rendered.push_str(&self.palette.span(kind).paint(text).to_string());
            } else {
                let (open, close) = match kind {
                    SpanKind::Phonetic => ("[", "]"),
                    SpanKind::Synonym => ("{", "}"),
                    SpanKind::Excluded => ("(", ")"),
                };
                rendered.push_str(open);
                rendered.push_str(text);
                rendered.push_str(close);
            }
            cursor = end;
        }
        rendered.push_str(&name[cursor..]);
        rendered
    }

    fn heading(&self, title: &str) {
        let formatted = format!("{HEADING_ICON} {title}");
        if self.paint {
            println!("{}", self.palette.heading.paint(formatted));
        } else {
            println!("{formatted}");
        }
    }
}

fn span(subset: &PhoneticSubset, kind: SpanKind) -> Option<(usize, usize, SpanKind)> {
    Some((subset.first_char_index?, subset.last_char_index_plus_one?, kind))
}

struct Palette {
    heading: Style,
    key: Style,
    value: Style,
    bullet: Style,
    info: Style,
    warn: Style,
    phonetic: Style,
    synonym: Style,
    excluded: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::Purple).bold(),
            key: Style::new().fg(Color::LightBlue).bold(),
            value: Style::new().fg(Color::White),
            bullet: Style::new().fg(Color::LightBlue),
            info: Style::new().fg(Color::LightCyan),
            warn: Style::new().fg(Color::Yellow).bold(),
            phonetic: Style::new().fg(Color::LightGreen).bold().underline(),
            synonym: Style::new().fg(Color::LightCyan).bold().underline(),
            excluded: Style::new().fg(Color::DarkGray).strikethrough(),
        }
    }

    fn plain() -> Self {
        Self {
            heading: Style::new(),
            key: Style::new(),
            value: Style::new(),
            bullet: Style::new(),
            info: Style::new(),
            warn: Style::new(),
            phonetic: Style::new(),
            synonym: Style::new(),
            excluded: Style::new(),
        }
    }

    fn span(&self, kind: SpanKind) -> Style {
        match kind {
            SpanKind::Phonetic => self.phonetic,
            SpanKind::Synonym => self.synonym,
            SpanKind::Excluded => self.excluded,
        }
    }
}

const HEADING_ICON: &str = "▸";
const WARNING_ICON: &str = "⚠";
const INFO_ICON: &str = "ℹ";
