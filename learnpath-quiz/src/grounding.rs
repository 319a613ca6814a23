//! Citation checks that decide whether a drafted question may be kept.

use std::fmt;

use learnpath_core::ids::QuestionId;
use learnpath_core::model::Question;

use crate::generator::DraftQuestion;
use crate::snippets::Snippet;

const QUOTES: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rejection {
    Malformed,
    MissingCitation,
    UnknownResource(String),
    CitationNotInSource,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed => f.write_str("options malformed or correct option ambiguous"),
            Rejection::MissingCitation => f.write_str("citation empty"),
            Rejection::UnknownResource(id) => write!(f, "cites unknown resource {id}"),
            Rejection::CitationNotInSource => f.write_str("citation not found verbatim in source"),
        }
    }
}

/// Trim surrounding whitespace and any wrapping quote characters.
pub(crate) fn clean_citation(raw: &str) -> &str {
    raw.trim().trim_matches(QUOTES).trim()
}

/// Accept a draft only when it is well formed and its citation is a substring of the
/// snippet it claims. A draft that names no resource may use the only snippet there is.
pub(crate) fn ground(draft: &DraftQuestion, snippets: &[Snippet]) -> Result<Question, Rejection> {
    let source = match draft.source_resource_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => snippets
            .iter()
            .find(|s| s.resource_id.as_str() == id)
            .ok_or_else(|| Rejection::UnknownResource(id.to_string()))?,
        _ => match snippets {
            [only] => only,
            _ => return Err(Rejection::UnknownResource(String::new())),
        },
    };

    let question = Question {
        id: QuestionId::new(),
        text: draft.text.trim().to_string(),
        options: draft.options.clone(),
        correct_option: draft.correct_option.trim().to_string(),
        explanation: draft.explanation.trim().to_string(),
        source_resource_id: source.resource_id.clone(),
        citation: clean_citation(&draft.citation).to_string(),
    };

    if !question.is_well_formed() {
        return Err(Rejection::Malformed);
    }
    if question.citation.is_empty() {
        return Err(Rejection::MissingCitation);
    }
    if !source.content.contains(&question.citation) {
        return Err(Rejection::CitationNotInSource);
    }
    Ok(question)
}
