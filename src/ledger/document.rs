//! Review document format.
//!
//! One document per entity type. Each pending item is one line:
//!
//! ```text
//! [3f2a9c0d11e4b785] "Norton Hosp Downtown" from "scrape:12/p3.pdf" | 1. "Norton Hospital" (91.30), 2. "Norton Clinic" (80.12) =>
//! ```
//!
//! The reviewer writes an annotation after `=>`. Lines starting with `#` are
//! comments. Quoted strings escape `"`, `\` and newlines, so any name
//! survives a render/parse round trip.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::ledger::ItemId;

/// Placeholder shown when an item has no ranked matches.
const NO_MATCHES: &str = "(no matches)";

/// A ranked canonical name shown to the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedName {
    /// Canonical name or alias.
    pub name: String,
    /// Combined score (0-100).
    pub score: f64,
}

/// One annotatable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLine {
    /// Stable item id.
    pub item_id: ItemId,
    /// Candidate name as received.
    pub candidate_name: String,
    /// Provenance rendered as `system:source_id`.
    pub source: String,
    /// Best matches, highest first.
    pub matches: Vec<RankedName>,
    /// Text after `=>`; empty when unannotated.
    pub annotation: String,
    /// Rendered as comment lines under the item; not parsed back.
    #[serde(default)]
    pub notes: Vec<String>,
}

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based line number.
    pub line: usize,
    /// Why it could not be parsed.
    pub reason: String,
}

/// Parsed review document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Type named by the header, if any.
    pub entity_type: Option<EntityType>,
    /// Item lines in document order.
    pub lines: Vec<ReviewLine>,
    /// Lines that could not be parsed.
    pub malformed: Vec<MalformedLine>,
}

fn quote(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Renders a review document.
#[must_use]
pub fn render(entity_type: &EntityType, lines: &[ReviewLine]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# canonry review: {entity_type}");
    out.push_str("# Annotate after \"=>\": ignore | add as <type>[; works at <firm>][; key=value, ...] | matches <canonical name> | note: <text>\n");
    out.push_str("# Lines left blank after \"=>\" stay pending.\n");

    for line in lines {
        let _ = write!(out, "[{}] ", line.item_id);
        quote(&line.candidate_name, &mut out);
        out.push_str(" from ");
        quote(&line.source, &mut out);
        out.push_str(" | ");
        if line.matches.is_empty() {
            out.push_str(NO_MATCHES);
        }
        for (i, m) in line.matches.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}. ", i + 1);
            quote(&m.name, &mut out);
            let _ = write!(out, " ({:.2})", m.score);
        }
        out.push_str(" =>");
        let annotation = line.annotation.replace(['\n', '\r'], " ");
        let annotation = annotation.trim();
        if !annotation.is_empty() {
            out.push(' ');
            out.push_str(annotation);
        }
        out.push('\n');
        for note in &line.notes {
            let _ = writeln!(out, "#   note: {}", note.replace(['\n', '\r'], " "));
        }
    }
    out
}

/// Parses a review document. Malformed lines are reported, not fatal.
#[must_use]
pub fn parse(text: &str) -> ParsedDocument {
    let mut doc = ParsedDocument::default();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if let Some(t) = comment.trim().strip_prefix("canonry review:") {
                doc.entity_type = t.trim().parse().ok();
            }
            continue;
        }
        match parse_line(line) {
            Ok(parsed) => doc.lines.push(parsed),
            Err(reason) => doc.malformed.push(MalformedLine {
                line: index + 1,
                reason,
            }),
        }
    }
    doc
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if let Some(rest) = self.rest.strip_prefix(token) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), String> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(format!("expected '{token}'"))
        }
    }

    fn quoted(&mut self) -> Result<String, String> {
        self.expect("\"")?;
        let mut out = String::new();
        let mut chars = self.rest.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.rest = &self.rest[i + 1..];
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err("unterminated quoted string".to_string())
    }

    fn until(&mut self, end: char) -> Result<&'a str, String> {
        let idx = self.rest.find(end).ok_or_else(|| format!("expected '{end}'"))?;
        let (head, tail) = self.rest.split_at(idx);
        self.rest = &tail[end.len_utf8()..];
        Ok(head)
    }
}

fn parse_line(line: &str) -> Result<ReviewLine, String> {
    let mut cur = Cursor { rest: line };
    cur.expect("[")?;
    let id = cur.until(']')?;
    let item_id = ItemId::parse(id).ok_or_else(|| format!("invalid item id '{id}'"))?;
    let candidate_name = cur.quoted()?;
    cur.expect("from")?;
    let source = cur.quoted()?;
    cur.expect("|")?;

    let mut matches = Vec::new();
    if !cur.eat(NO_MATCHES) {
        loop {
            let rank = cur.until('.')?;
            if rank.trim().parse::<usize>().ok() != Some(matches.len() + 1) {
                return Err(format!("unexpected rank '{}'", rank.trim()));
            }
            let name = cur.quoted()?;
            cur.expect("(")?;
            let score = cur.until(')')?;
            let score: f64 = score
                .trim()
                .parse()
                .map_err(|_| format!("invalid score '{}'", score.trim()))?;
            matches.push(RankedName { name, score });
            if !cur.eat(",") {
                break;
            }
        }
    }
    cur.expect("=>")?;

    Ok(ReviewLine {
        item_id,
        candidate_name,
        source,
        matches,
        annotation: cur.rest.trim().to_string(),
        notes: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, annotation: &str) -> ReviewLine {
        ReviewLine {
            item_id: ItemId::compute(&EntityType::Provider, name),
            candidate_name: name.to_string(),
            source: "scrape:12/p3.pdf".to_string(),
            matches: vec![
                RankedName {
                    name: "Norton Hospital".to_string(),
                    score: 91.3,
                },
                RankedName {
                    name: "Smith, \"Jones\" & Co => LLC".to_string(),
                    score: 80.126,
                },
            ],
            annotation: annotation.to_string(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_render_then_parse_roundtrip() {
        let lines = vec![
            line("Norton Hosp Downtown", ""),
            line("Back\\slash \"quoted\" (x) | y => z", "matches Norton Hospital"),
        ];
        let text = render(&EntityType::Provider, &lines);
        let doc = parse(&text);
        assert!(doc.malformed.is_empty(), "{:?}", doc.malformed);
        assert_eq!(doc.entity_type, Some(EntityType::Provider));
        assert_eq!(doc.lines.len(), 2);
        assert_eq!(doc.lines[1].candidate_name, lines[1].candidate_name);
        assert_eq!(doc.lines[1].annotation, "matches Norton Hospital");
        assert_eq!(doc.lines[0].annotation, "");
        assert_eq!(doc.lines[0].matches[1].name, "Smith, \"Jones\" & Co => LLC");
        assert!((doc.lines[0].matches[1].score - 80.13).abs() < 1e-9);
    }

    #[test]
    fn test_human_edit_survives() {
        let text = render(&EntityType::Provider, &[line("Norton Hosp", "")]);
        let edited = text.replace(" =>\n", " =>   add as provider; works at Norton Healthcare  \n");
        let doc = parse(&edited);
        assert_eq!(doc.lines[0].annotation, "add as provider; works at Norton Healthcare");
    }

    #[test]
    fn test_no_matches_and_notes() {
        let mut l = line("Lonely Clinic", "");
        l.matches.clear();
        l.notes.push("seen on intake form".to_string());
        let text = render(&EntityType::Provider, &[l]);
        assert!(text.contains("(no matches) =>"));
        assert!(text.contains("#   note: seen on intake form"));
        let doc = parse(&text);
        assert!(doc.lines[0].matches.is_empty());
    }

    #[test]
    fn test_malformed_lines_reported() {
        let text = "# canonry review: provider\n[nothex] \"x\" from \"y\" | (no matches) =>\ngarbage\n";
        let doc = parse(text);
        assert!(doc.lines.is_empty());
        assert_eq!(doc.malformed.len(), 2);
        assert_eq!(doc.malformed[0].line, 2);
    }
}
