//! Citation engine: binds answer sentences to the ranked chunks the answer
//! was generated from.
//!
//! [`CitationEngine::attach`] numbers the ranked chunks `1..=N` (capped at
//! `max_citations`), splits the answer into sentences and appends one
//! `[n]` marker to selected sentences, consuming ids in order. A sentence is
//! cited when, with ids still unused:
//!
//! 1. it is the first sentence;
//! 2. it contains an attribution phrase (`according to`, `shows`, ...);
//! 3. it contains a digit;
//! 4. its index is a multiple of three;
//! 5. the unused ids are at least as many as the sentences left to place.
//!
//! [`CitationEngine::validate`] checks the markers in an answer against the
//! citation list.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::chunk::UNTITLED;
use crate::models::{Citation, RankedCandidate};

pub const DEFAULT_MAX_CITATIONS: usize = 10;

const HTML_EXCERPT_CHARS: usize = 200;
const MARKDOWN_EXCERPT_CHARS: usize = 150;

const ATTRIBUTION_PHRASES: [&str; 19] = [
    "according to",
    "states",
    "indicates",
    "shows",
    "reveals",
    "demonstrates",
    "confirms",
    "suggests",
    "implies",
    "based on",
    "as mentioned",
    "as stated",
    "the document",
    "the source",
    "research",
    "study",
    "data",
    "evidence",
    "findings",
];

/// Marker consistency report produced by [`CitationEngine::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitationValidation {
    pub total_citations: usize,
    /// Number of `[n]` markers in the text, repeats included.
    pub citations_in_text: usize,
    /// Marker ids with no backing citation, in first-seen order.
    pub missing_citations: Vec<usize>,
    /// Citation ids never referenced in the text.
    pub unused_citations: Vec<usize>,
    /// Distinct referenced citations / total citations (0 when there are none).
    pub citation_coverage: f64,
    pub is_valid: bool,
}

/// Aggregate view over a citation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitationStats {
    pub total_citations: usize,
    pub unique_sources: usize,
    pub unique_sections: usize,
    /// Mean citation score rounded to three decimals.
    pub average_relevance_score: f64,
    pub sources: Vec<String>,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CitationEngine {
    max_citations: usize,
}

impl Default for CitationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CITATIONS)
    }
}

impl CitationEngine {
    pub fn new(max_citations: usize) -> Self {
        Self { max_citations }
    }

    pub fn max_citations(&self) -> usize {
        self.max_citations
    }

    /// Annotate `answer` with `[n]` markers and return it together with the
    /// citation list built from `ranked` (in rank order).
    ///
    /// Markers already present in `answer` are removed first (see
    /// [`strip_markers`]). With no ranked chunks the answer is returned
    /// unchanged.
    pub fn attach(&self, answer: &str, ranked: &[RankedCandidate]) -> (String, Vec<Citation>) {
        if ranked.is_empty() || self.max_citations == 0 {
            return (answer.to_string(), Vec::new());
        }

        let citations = self.build_citations(ranked);
        let cleaned = strip_markers(answer, citations.len());
        let sentences = split_sentences(&cleaned);

        let mut next_id = 1usize;
        let mut placed = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let unused = citations.len() + 1 - next_id;
            let remaining = sentences.len() - index;
            if unused > 0 && should_cite(&sentence.body, index, unused, remaining) {
                placed.push(format!("{} [{}]{}", sentence.body, next_id, sentence.terminator));
                next_id += 1;
            } else {
                placed.push(format!("{}{}", sentence.body, sentence.terminator));
            }
        }

        tracing::debug!(
            sentences = sentences.len(),
            citations = citations.len(),
            placed = next_id - 1,
            "attached citations"
        );
        (placed.join(" "), citations)
    }

    fn build_citations(&self, ranked: &[RankedCandidate]) -> Vec<Citation> {
        ranked
            .iter()
            .take(self.max_citations)
            .enumerate()
            .map(|(i, cand)| {
                let position_label = match (cand.position, cand.total_chunks) {
                    (Some(p), Some(t)) => format!("Chunk {} of {}", p + 1, t),
                    _ => format!("Chunk {}", i + 1),
                };
                Citation {
                    id: i + 1,
                    text: cand.text.clone(),
                    source: non_empty(cand.source.as_deref()).unwrap_or("Unknown Source").to_string(),
                    title: non_empty(cand.title.as_deref())
                        .unwrap_or(UNTITLED)
                        .to_string(),
                    section: non_empty(cand.section.as_deref())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Section {}", i + 1)),
                    position_label,
                    chunk_id: cand.chunk_id.clone(),
                    score: cand.effective_score(),
                }
            })
            .collect()
    }

    /// Check `answer`'s markers against `citations`.
    pub fn validate(&self, answer: &str, citations: &[Citation]) -> CitationValidation {
        let in_text = extract_citation_ids(answer);
        let available: Vec<usize> = citations.iter().map(|c| c.id).collect();

        let mut missing = Vec::new();
        for id in &in_text {
            if !available.contains(id) && !missing.contains(id) {
                missing.push(*id);
            }
        }
        let unused: Vec<usize> = available
            .iter()
            .copied()
            .filter(|id| !in_text.contains(id))
            .collect();

        let coverage = if citations.is_empty() {
            0.0
        } else {
            (available.len() - unused.len()) as f64 / available.len() as f64
        };

        CitationValidation {
            total_citations: citations.len(),
            citations_in_text: in_text.len(),
            is_valid: missing.is_empty(),
            missing_citations: missing,
            unused_citations: unused,
            citation_coverage: coverage,
        }
    }

    pub fn stats(&self, citations: &[Citation]) -> CitationStats {
        let mut sources: Vec<String> = Vec::new();
        let mut sections: Vec<String> = Vec::new();
        for c in citations {
            if !sources.contains(&c.source) {
                sources.push(c.source.clone());
            }
            if !sections.contains(&c.section) {
                sections.push(c.section.clone());
            }
        }
        let average = if citations.is_empty() {
            0.0
        } else {
            citations.iter().map(|c| c.score).sum::<f64>() / citations.len() as f64
        };

        CitationStats {
            total_citations: citations.len(),
            unique_sources: sources.len(),
            unique_sections: sections.len(),
            average_relevance_score: (average * 1000.0).round() / 1000.0,
            sources,
            sections,
        }
    }
}

/// All `[n]` marker ids in `text`, in order of appearance.
pub fn extract_citation_ids(text: &str) -> Vec<usize> {
    id_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// HTML source list. Empty string for no citations.
pub fn format_citations_display(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut html = String::from("<div class='citations'>\n<h4>Sources:</h4>\n<ol>\n");
    for c in citations {
        html.push_str(&format!(
            concat!(
                "<li id=\"citation-{id}\">\n",
                "  <strong>[{id}]</strong> {title}<br>\n",
                "  <small>\n",
                "    <strong>Source:</strong> {source}<br>\n",
                "    <strong>Section:</strong> {section}<br>\n",
                "    <strong>Position:</strong> {position}\n",
                "  </small>\n",
                "  <details>\n",
                "    <summary>View excerpt</summary>\n",
                "    <blockquote>{excerpt}</blockquote>\n",
                "  </details>\n",
                "</li>\n"
            ),
            id = c.id,
            title = escape_html(&c.title),
            source = escape_html(&c.source),
            section = escape_html(&c.section),
            position = escape_html(&c.position_label),
            excerpt = escape_html(&excerpt(&c.text, HTML_EXCERPT_CHARS)),
        ));
    }
    html.push_str("</ol>\n</div>");
    html
}

/// Markdown source list. Empty string for no citations.
pub fn format_citations_markdown(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut md = String::from("## Sources\n\n");
    for c in citations {
        md.push_str(&format!("**[{}]** {}\n", c.id, c.title));
        md.push_str(&format!("- **Source:** {}\n", c.source));
        md.push_str(&format!("- **Section:** {}\n", c.section));
        md.push_str(&format!("- **Position:** {}\n", c.position_label));
        md.push_str(&format!(
            "- **Excerpt:** {}\n\n",
            excerpt(&c.text, MARKDOWN_EXCERPT_CHARS)
        ));
    }
    md
}

/// Cut `text` to at most `max_chars` characters, backing off to the last
/// space when that keeps more than 80% of the budget.
pub fn truncate_at_word(text: &str, max_chars: usize) -> &str {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let truncated = &text[..cut];
    match truncated.rfind(' ') {
        Some(space) if truncated[..space].chars().count() as f64 > max_chars as f64 * 0.8 => {
            &truncated[..space]
        }
        _ => truncated,
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let cut = truncate_at_word(text, max_chars);
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

struct Sentence {
    body: String,
    /// The `.`/`!`/`?` run that ended the sentence; empty for a trailing fragment.
    terminator: String,
}

fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut out = Vec::new();
    let mut body = String::new();
    let mut terminator = String::new();

    let mut flush = |body: &mut String, terminator: &mut String| {
        let trimmed = body.trim();
        if !trimmed.is_empty() {
            out.push(Sentence {
                body: trimmed.to_string(),
                terminator: terminator.clone(),
            });
        }
        body.clear();
        terminator.clear();
    };

    for c in text.chars() {
        if matches!(c, '.' | '!' | '?') {
            terminator.push(c);
            continue;
        }
        if !terminator.is_empty() {
            flush(&mut body, &mut terminator);
        }
        body.push(c);
    }
    flush(&mut body, &mut terminator);
    out
}

/// Remove `[n]` markers the generator already wrote, for `n` in
/// `1..=max_id`. A bracketed number glued to a word (`items[0]`) is
/// content, not a marker, and stays.
fn strip_markers(answer: &str, max_id: usize) -> Cow<'_, str> {
    marker_re().replace_all(answer, |caps: &Captures| {
        let whole = &caps[0];
        let start = caps.get(0).map_or(0, |m| m.start());
        let in_range = caps[1]
            .parse::<usize>()
            .is_ok_and(|id| (1..=max_id).contains(&id));
        let spaced = whole.starts_with(char::is_whitespace);
        let glued = answer[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if in_range && (spaced || !glued) {
            String::new()
        } else {
            whole.to_string()
        }
    })
}

fn should_cite(sentence: &str, index: usize, unused: usize, remaining: usize) -> bool {
    if index == 0 {
        return true;
    }
    let lower = sentence.to_lowercase();
    if ATTRIBUTION_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    if sentence.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    index % 3 == 0 || unused >= remaining
}

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("valid regex"))
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\[(\d+)\]").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn candidate(i: usize, text: &str, score: f64) -> RankedCandidate {
        RankedCandidate {
            chunk_id: format!("doc_chunk_{}", i),
            doc_id: Some("doc".into()),
            text: text.into(),
            source: Some("animals.txt".into()),
            title: Some("Animals".into()),
            section: Some(format!("Part {}", i)),
            position: Some(i),
            total_chunks: Some(3),
            similarity_score: score,
            rerank_score: None,
            rerank_provider: None,
            metadata: Map::new(),
        }
    }

    fn three_chunks() -> Vec<RankedCandidate> {
        vec![
            candidate(0, "Cats are mammals.", 0.9),
            candidate(1, "Cats have four legs.", 0.8),
            candidate(2, "Felines eat meat.", 0.7),
        ]
    }

    #[test]
    fn test_three_sentences_three_chunks() {
        let engine = CitationEngine::default();
        let answer = "Cats are mammals. They have four legs. Felines are carnivores.";
        let (annotated, citations) = engine.attach(answer, &three_chunks());

        assert_eq!(
            annotated,
            "Cats are mammals [1]. They have four legs [2]. Felines are carnivores [3]."
        );
        assert_eq!(citations.len(), 3);
        assert_eq!(extract_citation_ids(&annotated), vec![1, 2, 3]);

        let report = engine.validate(&annotated, &citations);
        assert!(report.missing_citations.is_empty());
        assert!(report.unused_citations.is_empty());
        assert_eq!(report.citation_coverage, 1.0);
        assert!(report.is_valid);
    }

    #[test]
    fn test_more_sentences_than_citations() {
        let engine = CitationEngine::default();
        let answer = "First point here. Second point. Third point. Fourth point. Fifth point.";
        let (annotated, citations) = engine.attach(answer, &three_chunks()[..1]);

        assert_eq!(citations.len(), 1);
        assert_eq!(extract_citation_ids(&annotated), vec![1]);
        assert!(annotated.starts_with("First point here [1]."));
        assert_eq!(annotated.matches('[').count(), 1);

        let report = engine.validate(&annotated, &citations);
        assert!(report.is_valid);
        assert_eq!(report.citation_coverage, 1.0);
    }

    #[test]
    fn test_attribution_phrase_is_cited_before_later_sentences() {
        let engine = CitationEngine::default();
        let answer = "Intro. Plain words. According to the survey cats sleep. More words. Even more. End.";
        let (annotated, _) = engine.attach(answer, &three_chunks()[..2]);
        assert!(annotated.contains("According to the survey cats sleep [2]."));
        assert!(annotated.contains("Plain words."));
        assert!(!annotated.contains("Plain words ["));
    }

    #[test]
    fn test_ids_are_contiguous_and_used_once() {
        let engine = CitationEngine::default();
        let answer = (0..12).map(|i| format!("Claim {} holds.", i)).collect::<Vec<_>>().join(" ");
        let (annotated, citations) = engine.attach(&answer, &three_chunks());
        assert_eq!(extract_citation_ids(&annotated), vec![1, 2, 3]);
        let ids: Vec<usize> = citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_chunks_returns_answer_unchanged() {
        let engine = CitationEngine::default();
        let (annotated, citations) = engine.attach("Nothing to cite here.", &[]);
        assert_eq!(annotated, "Nothing to cite here.");
        assert!(citations.is_empty());
    }

    #[test]
    fn test_existing_markers_are_replaced() {
        let engine = CitationEngine::default();
        let (annotated, _) = engine.attach("Cats are mammals [2][1]. Dogs bark [2].", &three_chunks()[..2]);
        assert_eq!(annotated, "Cats are mammals [1]. Dogs bark [2].");
    }

    #[test]
    fn test_bracketed_content_survives_marker_removal() {
        let engine = CitationEngine::default();
        let (annotated, _) = engine.attach("Use items[0] to index. Cats purr [1].", &three_chunks()[..1]);
        assert_eq!(annotated, "Use items[0] to index [1]. Cats purr.");

        let (annotated, _) = engine.attach("See Article [7] of the charter.", &three_chunks()[..1]);
        assert_eq!(annotated, "See Article [7] of the charter [1].");

        let (annotated, _) = engine.attach("Read v[1] first.", &three_chunks()[..1]);
        assert_eq!(annotated, "Read v[1] first [1].");
    }

    #[test]
    fn test_citation_cap_and_placeholders() {
        let engine = CitationEngine::new(2);
        let mut ranked = three_chunks();
        ranked[1].source = None;
        ranked[1].title = Some(String::new());
        ranked[1].section = None;
        ranked[1].position = None;
        ranked[1].rerank_score = Some(0.42);

        let (_, citations) = engine.attach("One. Two. Three.", &ranked);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].position_label, "Chunk 1 of 3");
        assert_eq!(citations[1].source, "Unknown Source");
        assert_eq!(citations[1].title, "Untitled Document");
        assert_eq!(citations[1].section, "Section 2");
        assert_eq!(citations[1].position_label, "Chunk 2");
        assert_eq!(citations[1].score, 0.42);
        assert_eq!(citations[1].chunk_id, "doc_chunk_1");
    }

    #[test]
    fn test_validate_reports_missing_and_unused() {
        let engine = CitationEngine::default();
        let (_, citations) = engine.attach("A. B. C.", &three_chunks());
        let report = engine.validate("A [1]. B [5]. C [5].", &citations);
        assert_eq!(report.citations_in_text, 3);
        assert_eq!(report.missing_citations, vec![5]);
        assert_eq!(report.unused_citations, vec![2, 3]);
        assert!((report.citation_coverage - 1.0 / 3.0).abs() < 1e-9);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_validate_without_citations() {
        let report = CitationEngine::default().validate("Plain answer.", &[]);
        assert_eq!(report.citation_coverage, 0.0);
        assert!(report.is_valid);
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short", 10), "short");
        assert_eq!(truncate_at_word("the quick brown fox jumps", 22), "the quick brown fox");
        // Last space too early: hard cut.
        assert_eq!(truncate_at_word("a bcdefghijklmnop", 10), "a bcdefghi");
        assert_eq!(truncate_at_word("ééééé ééééé", 8), "ééééé éé");
    }

    #[test]
    fn test_markdown_format() {
        let engine = CitationEngine::default();
        let (_, citations) = engine.attach("Cats are mammals.", &three_chunks()[..1]);
        let md = format_citations_markdown(&citations);
        assert!(md.starts_with("## Sources\n\n**[1]** Animals\n"));
        assert!(md.contains("- **Position:** Chunk 1 of 3\n"));
        assert!(md.contains("- **Excerpt:** Cats are mammals.\n"));
        assert_eq!(format_citations_markdown(&[]), "");
    }

    #[test]
    fn test_html_format_escapes() {
        let engine = CitationEngine::default();
        let mut ranked = three_chunks();
        ranked[0].title = Some("<b>Cats</b> & Dogs".into());
        let (_, citations) = engine.attach("Cats.", &ranked[..1]);
        let html = format_citations_display(&citations);
        assert!(html.contains("id=\"citation-1\""));
        assert!(html.contains("&lt;b&gt;Cats&lt;/b&gt; &amp; Dogs"));
        assert_eq!(format_citations_display(&[]), "");
    }

    #[test]
    fn test_stats() {
        let engine = CitationEngine::default();
        let (_, citations) = engine.attach("A. B. C.", &three_chunks());
        let stats = engine.stats(&citations);
        assert_eq!(stats.total_citations, 3);
        assert_eq!(stats.unique_sources, 1);
        assert_eq!(stats.unique_sections, 3);
        assert_eq!(stats.average_relevance_score, 0.8);

        let empty = engine.stats(&[]);
        assert_eq!(empty.total_citations, 0);
        assert_eq!(empty.average_relevance_score, 0.0);
    }
}
