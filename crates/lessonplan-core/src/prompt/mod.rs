//! Deterministic prompt assembly.
//!
//! The prompt is built from, in order: a header describing the lesson, the
//! matched curriculum standard (if any), the lesson's local context entries
//! and the output instructions naming the six section keys.
//!
//! Context entries share a character budget measured over their rendered
//! `key: value` text. The newest entries are kept first; when the budget
//! runs out the boundary entry is cut short and everything older is
//! omitted. Kept entries are printed oldest to newest. A boundary entry is
//! only cut when at least two characters remain, so a budget that small
//! can leave out even the newest entry; [`AssembledPrompt::newest_omitted`]
//! reports that.

use lessonplan_db::models::{ContextEntry, CurriculumStandard, LessonPlan, Section};

pub const DEFAULT_CONTEXT_BUDGET_CHARS: usize = 4000;

const ELLIPSIS: char = '…';

/// Descriptors of the lesson being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptRequest<'a> {
    pub subject: &'a str,
    pub grade_level: &'a str,
    pub topic: &'a str,
    pub duration_minutes: i32,
    pub country: &'a str,
}

impl<'a> From<&'a LessonPlan> for PromptRequest<'a> {
    fn from(lesson: &'a LessonPlan) -> Self {
        Self {
            subject: &lesson.subject,
            grade_level: &lesson.grade_level,
            topic: &lesson.topic,
            duration_minutes: lesson.duration_minutes,
            country: &lesson.country,
        }
    }
}

/// An assembled prompt plus what happened to the context entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    pub included_entries: usize,
    pub omitted_entries: usize,
    /// Whether the oldest included entry was cut to fit the budget.
    pub truncated_entry: bool,
    /// Whether the most recent context entry is missing from the prompt.
    pub newest_omitted: bool,
}

fn render_entry(entry: &ContextEntry) -> String {
    format!("{}: {}", entry.key, entry.value)
}

/// Choose which rendered entries fit in `budget` characters.
///
/// Returns the kept lines in insertion order and whether the boundary line
/// was truncated.
fn fit_context(entries: &[ContextEntry], budget: usize) -> (Vec<String>, bool) {
    let mut remaining = budget;
    let mut kept = Vec::new();
    let mut truncated = false;

    for entry in entries.iter().rev() {
        let line = render_entry(entry);
        let len = line.chars().count();
        if len <= remaining {
            remaining -= len;
            kept.push(line);
            continue;
        }
        if remaining >= 2 {
            let mut cut: String = line.chars().take(remaining - 1).collect();
            cut.push(ELLIPSIS);
            kept.push(cut);
            truncated = true;
        }
        break;
    }

    kept.reverse();
    (kept, truncated)
}

/// Build the generation prompt. Pure; identical inputs give identical text.
pub fn assemble_prompt(
    request: PromptRequest<'_>,
    standard: Option<&CurriculumStandard>,
    context: &[ContextEntry],
    budget: usize,
) -> AssembledPrompt {
    let mut text = format!(
        "You are an experienced teacher writing a lesson plan for a classroom in {}.\n\n",
        request.country
    );
    text.push_str(&format!("Subject: {}\n", request.subject));
    text.push_str(&format!("Grade level: {}\n", request.grade_level));
    text.push_str(&format!("Topic: {}\n", request.topic));
    text.push_str(&format!("Duration: {} minutes\n", request.duration_minutes));
    text.push_str(&format!("Country: {}\n", request.country));

    if let Some(standard) = standard {
        text.push_str("\n## Curriculum Standard\n");
        text.push_str(&format!(
            "{}: {}\n",
            standard.standard_code, standard.description
        ));
    }

    let (lines, truncated_entry) = fit_context(context, budget);
    if !lines.is_empty() {
        text.push_str("\n## Local Context\n");
        for line in &lines {
            text.push_str(&format!("- {line}\n"));
        }
    }

    text.push_str("\n## Instructions\n");
    text.push_str(
        "Respond with a single JSON object and nothing else. \
         It must have exactly these keys, each with a string value:\n",
    );
    for section in Section::ALL {
        text.push_str(&format!("- \"{}\": {}\n", section.key(), section.title()));
    }
    text.push_str("Use the local context above to make examples relevant to the learners.\n");

    AssembledPrompt {
        text,
        included_entries: lines.len(),
        omitted_entries: context.len() - lines.len(),
        truncated_entry,
        newest_omitted: !context.is_empty() && lines.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn request() -> PromptRequest<'static> {
        PromptRequest {
            subject: "Mathematics",
            grade_level: "Grade 5",
            topic: "Fractions",
            duration_minutes: 40,
            country: "Nigeria",
        }
    }

    fn entry(id: i64, key: &str, value: &str) -> ContextEntry {
        ContextEntry {
            id,
            lesson_id: Uuid::nil(),
            key: key.to_string(),
            value: value.to_string(),
            created_at: Utc::now(),
        }
    }

    fn standard() -> CurriculumStandard {
        CurriculumStandard {
            id: Uuid::nil(),
            subject: "Mathematics".into(),
            grade_level: "Grade 5".into(),
            country: "Nigeria".into(),
            topic: Some("Fractions".into()),
            standard_code: "NG-M5-FR".into(),
            description: "Add and subtract proper fractions".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let prompt = assemble_prompt(
            request(),
            Some(&standard()),
            &[entry(1, "market", "Balogun")],
            DEFAULT_CONTEXT_BUDGET_CHARS,
        );
        let text = &prompt.text;
        let header = text.find("Subject: Mathematics").unwrap();
        let standard = text.find("NG-M5-FR: Add and subtract").unwrap();
        let context = text.find("- market: Balogun").unwrap();
        let instructions = text.find("## Instructions").unwrap();
        assert!(header < standard && standard < context && context < instructions);
        for section in Section::ALL {
            assert!(text.contains(&format!("\"{}\"", section.key())));
        }
        assert_eq!(prompt.included_entries, 1);
        assert_eq!(prompt.omitted_entries, 0);
    }

    #[test]
    fn no_standard_or_context_omits_their_headings() {
        let prompt = assemble_prompt(request(), None, &[], DEFAULT_CONTEXT_BUDGET_CHARS);
        assert!(!prompt.text.contains("## Curriculum Standard"));
        assert!(!prompt.text.contains("## Local Context"));
        assert!(prompt.text.contains("Duration: 40 minutes"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let context = [entry(1, "a", "one"), entry(2, "b", "two")];
        let first = assemble_prompt(request(), Some(&standard()), &context, 100);
        let second = assemble_prompt(request(), Some(&standard()), &context, 100);
        assert_eq!(first, second);
    }

    #[test]
    fn over_budget_drops_oldest_and_keeps_order() {
        // Each rendered entry is 10 chars.
        let context = [
            entry(1, "k1", "oldest"),
            entry(2, "k2", "middle"),
            entry(3, "k3", "newest"),
        ];
        let prompt = assemble_prompt(request(), None, &context, 20);
        assert!(!prompt.text.contains("oldest"));
        let middle = prompt.text.find("- k2: middle").unwrap();
        let newest = prompt.text.find("- k3: newest").unwrap();
        assert!(middle < newest);
        assert_eq!(prompt.included_entries, 2);
        assert_eq!(prompt.omitted_entries, 1);
        assert!(!prompt.truncated_entry);
    }

    #[test]
    fn boundary_entry_is_truncated_on_char_boundary() {
        let context = [entry(1, "note", "ọjà market day"), entry(2, "k", "newest")];
        // "k: newest" is 9 chars; 6 remain for the older entry.
        let prompt = assemble_prompt(request(), None, &context, 15);
        assert!(prompt.text.contains("- note:…\n"));
        assert!(prompt.text.contains("- k: newest\n"));
        assert!(prompt.truncated_entry);
        assert_eq!(prompt.included_entries, 2);

        let prompt = assemble_prompt(request(), None, &[entry(1, "k", "ọjà")], 4);
        assert!(prompt.text.contains("- k: …\n"));
    }

    #[test]
    fn newest_entry_is_truncated_rather_than_dropped() {
        let context = [entry(1, "old", "x"), entry(2, "long", &"a".repeat(50))];
        let prompt = assemble_prompt(request(), None, &context, 10);
        assert!(prompt.text.contains("- long: aaa…\n"));
        assert!(!prompt.text.contains("old: x"));
        assert_eq!(prompt.included_entries, 1);
        assert_eq!(prompt.omitted_entries, 1);
    }

    #[test]
    fn zero_budget_omits_all_context() {
        let prompt = assemble_prompt(request(), None, &[entry(1, "k", "v")], 0);
        assert!(!prompt.text.contains("## Local Context"));
        assert_eq!(prompt.omitted_entries, 1);
        assert!(prompt.newest_omitted);
    }

    #[test]
    fn one_char_budget_reports_newest_omitted() {
        let context = [entry(1, "old", "x"), entry(2, "market", "Balogun")];
        let prompt = assemble_prompt(request(), None, &context, 1);
        assert!(!prompt.text.contains("market"));
        assert_eq!(prompt.included_entries, 0);
        assert!(prompt.newest_omitted);

        let prompt = assemble_prompt(request(), None, &context, 2);
        assert!(prompt.text.contains("- m…\n"));
        assert!(!prompt.newest_omitted);

        let prompt = assemble_prompt(request(), None, &[], 1);
        assert!(!prompt.newest_omitted);
    }
}
