use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Topic used when the upload form carries none.
pub const DEFAULT_TOPIC: &str = "General Biomedical Analysis";

/// Bibliographic parameters pulled from a paper by the hosted LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperParameters {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub reference_count: String,
    pub study_type: String,
    pub population_size: String,
}

impl PaperParameters {
    /// Field labels in the order the LLM is asked to return them.
    pub const FIELDS: [&'static str; 5] = [
        "Title",
        "Abstract",
        "Number of references",
        "Study type",
        "Population size",
    ];

    /// Builds a record from exactly five values in `FIELDS` order.
    pub fn from_fields(fields: Vec<String>) -> Option<Self> {
        let [title, abstract_text, reference_count, study_type, population_size]: [String; 5] =
            fields.try_into().ok()?;
        Some(Self {
            title,
            abstract_text,
            reference_count,
            study_type,
            population_size,
        })
    }

    /// `(label, value)` pairs in `FIELDS` order.
    pub fn labelled(&self) -> [(&'static str, &str); 5] {
        [
            (Self::FIELDS[0], self.title.as_str()),
            (Self::FIELDS[1], self.abstract_text.as_str()),
            (Self::FIELDS[2], self.reference_count.as_str()),
            (Self::FIELDS[3], self.study_type.as_str()),
            (Self::FIELDS[4], self.population_size.as_str()),
        ]
    }
}

/// Either a complete extraction record or `{"error": "..."}`.
///
/// Serialized untagged, so clients check for the `error` key rather than
/// assuming a fixed shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    Record(PaperParameters),
    Error { error: String },
}

impl Parameters {
    pub fn error(message: impl Into<String>) -> Self {
        Parameters::Error {
            error: message.into(),
        }
    }

    pub fn record(&self) -> Option<&PaperParameters> {
        match self {
            Parameters::Record(record) => Some(record),
            Parameters::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Parameters::Record(_) => None,
            Parameters::Error { error } => Some(error),
        }
    }
}

/// Parameters plus the string shown to the user for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub parameters: Parameters,
    /// Cleaned `" | "`-joined fields, or the error message.
    pub display: String,
}

impl Extraction {
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            parameters: Parameters::error(message.clone()),
            display: message,
        }
    }
}

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(good|bad)\b").expect("verdict pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Good,
    Bad,
    Unclassified,
}

impl Verdict {
    /// A reply naming exactly one of the two labels (as a whole word, any
    /// case) gets that label. Replies naming both or neither are
    /// unclassified.
    pub fn from_reply(reply: &str) -> Self {
        let mut good = false;
        let mut bad = false;
        for label in LABEL_PATTERN.find_iter(reply) {
            if label.as_str().eq_ignore_ascii_case("good") {
                good = true;
            } else {
                bad = true;
            }
        }

        match (good, bad) {
            (true, false) => Verdict::Good,
            (false, true) => Verdict::Bad,
            _ => Verdict::Unclassified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Good => "good",
            Verdict::Bad => "bad",
            Verdict::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one uploaded file as it moves through the triage workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDocument {
    pub id: String,
    pub filename: String,
    pub topic: String,
    /// Scratch copy of the upload; lives only as long as the request.
    pub pdf_path: String,
    pub extracted_text: Option<String>,
    pub extraction: Option<Extraction>,
    pub model_reply: Option<String>,
    pub verdict: Option<Verdict>,
    pub archived_as: Option<String>,
    pub error: Option<String>,
}

impl PaperDocument {
    pub fn new(filename: impl Into<String>, topic: impl Into<String>, pdf_path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            topic: topic.into(),
            pdf_path: pdf_path.into(),
            extracted_text: None,
            extraction: None,
            model_reply: None,
            verdict: None,
            archived_as: None,
            error: None,
        }
    }
}

/// Per-file entry of an upload response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub filename: String,
    pub topic: String,
    pub parameters: Parameters,
    pub display: String,
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_as: Option<String>,
}

impl FileReport {
    pub fn failed(filename: impl Into<String>, topic: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            filename: filename.into(),
            topic: topic.into(),
            parameters: Parameters::error(message.clone()),
            display: message.clone(),
            verdict: None,
            error: Some(message),
            archived_as: None,
        }
    }
}

impl From<PaperDocument> for FileReport {
    fn from(document: PaperDocument) -> Self {
        let extraction = document.extraction.unwrap_or_else(|| {
            Extraction::failed(
                document
                    .error
                    .clone()
                    .unwrap_or_else(|| "Document was not processed".to_string()),
            )
        });

        // A record-level error is also the file's error.
        let error = document
            .error
            .or_else(|| extraction.parameters.error_message().map(str::to_string));

        Self {
            filename: document.filename,
            topic: document.topic,
            parameters: extraction.parameters,
            display: error.clone().unwrap_or(extraction.display),
            verdict: if error.is_some() { None } else { document.verdict },
            error,
            archived_as: document.archived_as,
        }
    }
}

/// Response body of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub pdf_count: usize,
    pub topic: String,
    pub good_count: usize,
    pub bad_count: usize,
    pub unclassified_count: usize,
    pub results: Vec<FileReport>,
}

impl UploadSummary {
    pub fn new(topic: String, results: Vec<FileReport>) -> Self {
        let count = |verdict: Verdict| {
            results
                .iter()
                .filter(|report| report.verdict == Some(verdict))
                .count()
        };

        Self {
            pdf_count: results.len(),
            good_count: count(Verdict::Good),
            bad_count: count(Verdict::Bad),
            unclassified_count: count(Verdict::Unclassified),
            topic,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verdict_single_label() {
        assert_eq!(Verdict::from_reply("Good"), Verdict::Good);
        assert_eq!(Verdict::from_reply("This paper is good."), Verdict::Good);
        assert_eq!(Verdict::from_reply("BAD"), Verdict::Bad);
        assert_eq!(Verdict::from_reply("bad, bad, bad"), Verdict::Bad);
    }

    #[test]
    fn verdict_ambiguous_or_absent_is_unclassified() {
        assert_eq!(Verdict::from_reply("good but also bad"), Verdict::Unclassified);
        assert_eq!(Verdict::from_reply("irrelevant"), Verdict::Unclassified);
        assert_eq!(Verdict::from_reply(""), Verdict::Unclassified);
        // Labels must be whole words.
        assert_eq!(Verdict::from_reply("goodness badge"), Verdict::Unclassified);
    }

    #[test]
    fn parameters_serialize_as_record_or_error() {
        let record = PaperParameters::from_fields(
            ["T", "A", "12", "RCT", "200"].map(String::from).to_vec(),
        )
        .unwrap();
        let value = serde_json::to_value(Parameters::Record(record)).unwrap();
        assert_eq!(
            value,
            json!({
                "title": "T",
                "abstract": "A",
                "reference_count": "12",
                "study_type": "RCT",
                "population_size": "200"
            })
        );

        let value = serde_json::to_value(Parameters::error("boom")).unwrap();
        assert_eq!(value, json!({ "error": "boom" }));
    }

    #[test]
    fn from_fields_requires_exactly_five() {
        assert!(PaperParameters::from_fields(vec!["a".into(); 4]).is_none());
        assert!(PaperParameters::from_fields(vec!["a".into(); 6]).is_none());
    }

    #[test]
    fn report_from_failed_document_carries_error() {
        let mut document = PaperDocument::new("a.pdf", "topic", "/tmp/a.pdf");
        document.error = Some("No text could be extracted from PDF".into());
        document.verdict = Some(Verdict::Good);

        let report = FileReport::from(document);
        assert_eq!(report.verdict, None);
        assert_eq!(
            report.parameters.error_message(),
            Some("No text could be extracted from PDF")
        );
        assert_eq!(report.display, "No text could be extracted from PDF");
    }

    #[test]
    fn summary_counts_only_classified_reports() {
        let mut good = FileReport::failed("a.pdf", "t", "x");
        good.error = None;
        good.verdict = Some(Verdict::Good);
        let mut unclassified = good.clone();
        unclassified.verdict = Some(Verdict::Unclassified);
        let failed = FileReport::failed("b.pdf", "t", "boom");

        let summary = UploadSummary::new("t".into(), vec![good, unclassified, failed]);
        assert_eq!(summary.pdf_count, 3);
        assert_eq!(summary.good_count, 1);
        assert_eq!(summary.bad_count, 0);
        assert_eq!(summary.unclassified_count, 1);
    }
}
