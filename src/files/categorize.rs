//! Filename based classification and ranking of search results.

use super::FileEntry;
use lazy_regex::lazy_regex;
use regex::Regex;
use std::collections::BTreeMap;

/// Semantic bucket a file is sorted into.
///
/// Variant order is the bucket order used by [`rank_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileCategory {
    /// Primary course document
    Handout,
    /// Annotated copy of the primary document
    HighlightedHandout,
    /// Major graded quiz
    GrandQuiz,
    /// Regular quiz or test
    Quiz,
    /// Practice material
    Practice,
    /// Solutions to assignments or quizzes
    Solution,
    /// Anything else
    Other,
}

static RE_HIGHLIGHTED: lazy_regex::Lazy<Regex> =
    lazy_regex!(r"(?i)highlight.*handout|handout.*highlight");
static RE_HANDOUT: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\bhandout\b");
static RE_GRAND_QUIZ: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)grand.*quiz");
static RE_QUIZ: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\b(quiz|test)\b");
static RE_PRACTICE: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)practice");
static RE_SOLUTION: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)solution|solve");

/// Evaluated top to bottom, first match wins.
///
/// The highlighted rule must stay ahead of the plain handout rule: every
/// highlighted handout name also matches `\bhandout\b`.
static CATEGORY_RULES: [(&lazy_regex::Lazy<Regex>, FileCategory); 6] = [
    (&RE_HIGHLIGHTED, FileCategory::HighlightedHandout),
    (&RE_HANDOUT, FileCategory::Handout),
    (&RE_GRAND_QUIZ, FileCategory::GrandQuiz),
    (&RE_QUIZ, FileCategory::Quiz),
    (&RE_PRACTICE, FileCategory::Practice),
    (&RE_SOLUTION, FileCategory::Solution),
];

/// Classify a single file name
#[must_use]
pub fn category_of(name: &str) -> FileCategory {
    CATEGORY_RULES
        .iter()
        .find(|(re, _)| re.is_match(name))
        .map_or(FileCategory::Other, |(_, category)| *category)
}

/// Files grouped by category, each bucket in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedFiles {
    buckets: BTreeMap<FileCategory, Vec<FileEntry>>,
}

impl CategorizedFiles {
    /// Files in one bucket
    #[must_use]
    pub fn get(&self, category: FileCategory) -> &[FileEntry] {
        self.buckets.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of categorized files
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Returns true if no file was categorized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-pass classification of `files`.
#[must_use]
pub fn categorize(files: Vec<FileEntry>) -> CategorizedFiles {
    let mut categorized = CategorizedFiles::default();
    for file in files {
        categorized
            .buckets
            .entry(category_of(&file.name))
            .or_default()
            .push(file);
    }
    categorized
}

/// Ranked short-list:
/// 1. the smallest handout (first one wins on equal size),
/// 2. every highlighted handout,
/// 3. the first grand quiz,
/// 4. everything else, PDFs first, then ascending size,
///
/// truncated to `cap`.
#[must_use]
pub fn prioritize(categorized: &CategorizedFiles, cap: usize) -> Vec<FileEntry> {
    let mut ranked = Vec::new();

    // min_by_key keeps the first minimum
    if let Some(smallest) = categorized
        .get(FileCategory::Handout)
        .iter()
        .min_by_key(|f| f.size.sort_key())
    {
        ranked.push(smallest.clone());
    }

    ranked.extend_from_slice(categorized.get(FileCategory::HighlightedHandout));

    if let Some(grand) = categorized.get(FileCategory::GrandQuiz).first() {
        ranked.push(grand.clone());
    }

    let mut rest: Vec<FileEntry> = [
        FileCategory::Quiz,
        FileCategory::Practice,
        FileCategory::Solution,
        FileCategory::Other,
    ]
    .iter()
    .flat_map(|category| categorized.get(*category).iter().cloned())
    .collect();
    rest.sort_by_key(|f| (!f.is_pdf(), f.size.sort_key()));
    ranked.extend(rest);

    ranked.truncate(cap);
    ranked
}

/// Uncapped concatenation of every bucket in category order.
#[must_use]
pub fn rank_all(categorized: &CategorizedFiles) -> Vec<FileEntry> {
    categorized.buckets.values().flatten().cloned().collect()
}

/// Keep files whose lowercase name contains every whitespace-separated keyword.
#[must_use]
pub fn filter_by_keywords(files: Vec<FileEntry>, keywords: &str) -> Vec<FileEntry> {
    let keywords: Vec<String> = keywords
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    if keywords.is_empty() {
        return files;
    }

    files
        .into_iter()
        .filter(|f| {
            let name = f.name.to_lowercase();
            keywords.iter().all(|k| name.contains(k.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::test_support::{local, remote};

    fn names(files: &[FileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_category_rules() {
        assert_eq!(category_of("CS101 Handout.pdf"), FileCategory::Handout);
        assert_eq!(
            category_of("CS101 Highlighted Handout.pdf"),
            FileCategory::HighlightedHandout
        );
        assert_eq!(
            category_of("handout highlights.pdf"),
            FileCategory::HighlightedHandout
        );
        assert_eq!(category_of("Grand Quiz 2024.pdf"), FileCategory::GrandQuiz);
        assert_eq!(category_of("quiz 1.docx"), FileCategory::Quiz);
        assert_eq!(category_of("mid test.pdf"), FileCategory::Quiz);
        assert_eq!(category_of("practice set.pdf"), FileCategory::Practice);
        assert_eq!(category_of("assignment solved.pdf"), FileCategory::Solution);
        assert_eq!(category_of("syllabus.pdf"), FileCategory::Other);
    }

    #[test]
    fn test_highlighted_never_double_counted() {
        let categorized = categorize(vec![
            local("CS101 handout.pdf", 10),
            local("CS101 highlighted handout.pdf", 20),
        ]);

        assert_eq!(names(categorized.get(FileCategory::Handout)), vec!["CS101 handout.pdf"]);
        assert_eq!(
            names(categorized.get(FileCategory::HighlightedHandout)),
            vec!["CS101 highlighted handout.pdf"]
        );
        assert_eq!(categorized.len(), 2);
    }

    #[test]
    fn test_prioritize_order() {
        let categorized = categorize(vec![
            local("notes.docx", 5),
            local("handout big.pdf", 900),
            local("handout small.pdf", 100),
            local("handout small copy.pdf", 100),
            local("grand quiz a.pdf", 50),
            local("grand quiz b.pdf", 10),
            local("highlighted handout.pdf", 700),
            local("quiz 1.pdf", 30),
            local("practice.pdf", 20),
            local("solution.docx", 1),
        ]);

        let ranked = prioritize(&categorized, 10);
        assert_eq!(
            names(&ranked),
            vec![
                "handout small.pdf",
                "highlighted handout.pdf",
                "grand quiz a.pdf",
                "practice.pdf",
                "quiz 1.pdf",
                "solution.docx",
                "notes.docx",
            ]
        );
    }

    #[test]
    fn test_prioritize_respects_cap_and_single_handout() {
        let files: Vec<FileEntry> = (0..30)
            .map(|i| local(&format!("handout part {i}.pdf"), 1000 - i))
            .chain((0..30).map(|i| local(&format!("misc {i}.pdf"), i)))
            .collect();
        let categorized = categorize(files);

        for cap in [0, 1, 5, 10] {
            let ranked = prioritize(&categorized, cap);
            assert!(ranked.len() <= cap);
            let handouts = ranked
                .iter()
                .filter(|f| category_of(&f.name) == FileCategory::Handout)
                .count();
            assert!(handouts <= 1);
            if cap > 0 {
                assert_eq!(ranked[0].name, "handout part 29.pdf");
            }
        }
    }

    #[test]
    fn test_unknown_size_never_wins_smallest_handout() {
        let categorized = categorize(vec![
            remote("handout unknown.pdf", None),
            remote("handout known.pdf", Some(4096)),
        ]);
        let ranked = prioritize(&categorized, 10);
        assert_eq!(ranked[0].name, "handout known.pdf");
    }

    #[test]
    fn test_rank_all_is_uncapped_in_bucket_order() {
        let categorized = categorize(vec![
            local("z other.pdf", 1),
            local("quiz.pdf", 1),
            local("highlighted handout.pdf", 1),
            local("handout 1.pdf", 2),
            local("handout 2.pdf", 1),
        ]);
        assert_eq!(
            names(&rank_all(&categorized)),
            vec![
                "handout 1.pdf",
                "handout 2.pdf",
                "highlighted handout.pdf",
                "quiz.pdf",
                "z other.pdf",
            ]
        );
    }

    #[test]
    fn test_filter_by_keywords() {
        let files = vec![
            local("CS101 Mid Term Solved.pdf", 1),
            local("CS101 Final Term.pdf", 1),
        ];
        assert_eq!(
            names(&filter_by_keywords(files.clone(), "mid SOLVED")),
            vec!["CS101 Mid Term Solved.pdf"]
        );
        assert_eq!(filter_by_keywords(files.clone(), "  ").len(), 2);
        assert!(filter_by_keywords(files, "grand").is_empty());
    }
}
