use tracing::info;

use crate::local_model::{SamplingParams, TextGenerator, extract_assistant_reply, single_turn_prompt};
use crate::models::PaperParameters;

pub fn build_classification_prompt(topic: &str, parameters: &PaperParameters) -> String {
    let mut message = format!("Topic: {}\n", topic);
    for (label, value) in parameters.labelled() {
        message.push_str(&format!("{}: {}\n", label, value));
    }
    message.push_str(
        "\nBased on the paper details above, is this paper good or bad for the topic? \
        Answer with a single word: good or bad.",
    );
    single_turn_prompt(&message)
}

/// Asks the local model for a verdict and returns its trimmed reply.
pub async fn classify(
    generator: &dyn TextGenerator,
    sampling: &SamplingParams,
    topic: &str,
    parameters: &PaperParameters,
) -> anyhow::Result<String> {
    let prompt = build_classification_prompt(topic, parameters);
    let decoded = generator.generate(&prompt, sampling).await?;
    let reply = extract_assistant_reply(&decoded);
    info!(reply = %reply, "Local model replied");
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Verdict;
    use crate::test_support::FixedGenerator;

    fn parameters() -> PaperParameters {
        PaperParameters {
            title: "Statins in the elderly".into(),
            abstract_text: "A cohort study.".into(),
            reference_count: "31".into(),
            study_type: "Cohort".into(),
            population_size: "5400".into(),
        }
    }

    #[test]
    fn prompt_carries_topic_and_every_field() {
        let prompt = build_classification_prompt("Cardiology", &parameters());
        assert!(prompt.contains("Topic: Cardiology"));
        assert!(prompt.contains("Title: Statins in the elderly"));
        assert!(prompt.contains("Abstract: A cohort study."));
        assert!(prompt.contains("Number of references: 31"));
        assert!(prompt.contains("Study type: Cohort"));
        assert!(prompt.contains("Population size: 5400"));
    }

    #[tokio::test]
    async fn reply_is_extracted_from_decoded_output() {
        let generator = FixedGenerator::replying(" Good\n");

        let reply = classify(&generator, &SamplingParams::default(), "Cardiology", &parameters())
            .await
            .unwrap();

        assert_eq!(reply, "Good");
        assert_eq!(Verdict::from_reply(&reply), Verdict::Good);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn generator_errors_propagate() {
        let generator = FixedGenerator::failing("model offline");

        let err = classify(&generator, &SamplingParams::default(), "Cardiology", &parameters())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("model offline"));
    }
}
