use chrono::Local;

use crate::{
    configuration::ReportSettings,
    domain::entities::{classification::ImageFindings, guideline::GuidelineEntry},
};

/// Section header every report must start with, whatever the completion
/// service decided to answer
const REPORT_HEADER: &str = "Patient Report";

const SUMMARY_MARKER: &str = "Summary:";
const SOLUTIONS_MARKER: &str = "Probable Treatment Solutions:";

const MISMATCH_NOTE: &str =
    " (Note: Image finding may not align with nurse observation of a deep cut)";

/// Assembles the generation prompt and guarantees the shape of the final
/// report.
///
/// The composer owns every textual policy of the report: the findings
/// string and its observation cross-check, the retrieval query, the
/// generation template, the date, and the repair applied when the
/// completion service deviates from the template.
pub struct ReportComposer {
    date_override: Option<String>,
}

/// A prompt ready for the completion service
pub struct GenerationPrompt {
    pub system: String,
    pub user: String,
}

impl ReportComposer {
    pub fn new(settings: &ReportSettings) -> Self {
        Self {
            date_override: settings.date_override.clone(),
        }
    }

    /// Renders the classifier outcome as the findings string used in the
    /// report, cross-checked against the nurse observations.
    ///
    /// A nurse observation of a deep cut that the detection does not confirm
    /// gets an explicit mismatch note, so the doctor is never presented two
    /// silently contradicting signals.
    pub fn findings_text(&self, nurse_observations: &str, findings: &ImageFindings) -> String {
        let mut text = findings.to_string();

        if let ImageFindings::Detected { label, .. } = findings {
            let observations = nurse_observations.to_lowercase();
            if observations.contains("deep cut") && !label.to_lowercase().contains("deep cut") {
                text.push_str(MISMATCH_NOTE);
            }
        }

        text
    }

    /// Builds the query string embedded for guideline retrieval.
    ///
    /// A failed classification degrades the query to the nurse text alone;
    /// any other outcome is an auxiliary signal worth retrieving on.
    pub fn retrieval_query(
        &self,
        nurse_observations: &str,
        findings: &ImageFindings,
        findings_text: &str,
    ) -> String {
        match findings {
            ImageFindings::Failed(_) => nurse_observations.to_string(),
            _ => format!("{} {}", nurse_observations, findings_text),
        }
    }

    /// Assembles the full generation prompt from the observations, the
    /// findings string and the retrieved guidelines.
    pub fn build_prompt(
        &self,
        nurse_observations: &str,
        findings_text: &str,
        guidelines: &[&GuidelineEntry],
    ) -> GenerationPrompt {
        let date = self.report_date();
        let guidelines: Vec<&str> = guidelines
            .iter()
            .map(|entry| entry.context.as_str())
            .collect();

        let user = format!(
            "You are a medical assistant in an ER. Using the guidelines, nurse observations, \
             and image findings below, select the most appropriate guideline and generate a \
             comprehensive report for the doctor about the patient's condition. Include a \
             summary of the condition and probable treatment solutions based strictly on the \
             selected guideline. The date must be {date}, and do not use any other date. \
             Format the response as follows:\n\
             Patient Report:\n\
             - Date: {date}\n\
             - Nurse Observations: [observations]\n\
             - Visual Findings: [findings]\n\
             - Summary: [summary]\n\
             Probable Treatment Solutions:\n\
             - [solution 1]\n\
             - [solution 2]\n\
             - [solution 3]\n\
             \n\
             Guidelines: {guidelines:?}\n\
             Nurse Observations: \"{nurse_observations}\"\n\
             Image Findings: \"{findings_text}\"",
        );

        GenerationPrompt {
            system: "You are a medical assistant.".to_string(),
            user,
        }
    }

    /// Makes sure the caller always receives a report in the expected shape.
    ///
    /// A compliant completion passes through untouched. Anything else is
    /// rebuilt: the known fields (observations, findings, date) are
    /// re-injected, and whatever summary and solutions text can be located
    /// in the completion is salvaged into their sections.
    pub fn render_report(
        &self,
        completion: &str,
        nurse_observations: &str,
        findings_text: &str,
    ) -> String {
        let completion = completion.trim();
        if completion.starts_with(REPORT_HEADER) {
            return completion.to_string();
        }

        let summary = match completion.rsplit_once(SUMMARY_MARKER) {
            Some((_, after)) => after,
            None => completion,
        };
        let summary = summary
            .split(SOLUTIONS_MARKER)
            .next()
            .unwrap_or_default()
            .trim();

        let solutions: Vec<String> = match completion.rsplit_once(SOLUTIONS_MARKER) {
            Some((_, after)) => after
                .lines()
                .map(|line| line.trim().trim_start_matches("- ").trim())
                .filter(|line| !line.is_empty())
                .map(|line| format!("- {}", line))
                .collect(),
            None => vec![],
        };

        format!(
            "Patient Report:\n\
             - Date: {date}\n\
             - Nurse Observations: {nurse_observations}\n\
             - Visual Findings: {findings_text}\n\
             - Summary: {summary}\n\
             Probable Treatment Solutions:\n\
             {solutions}",
            date = self.report_date(),
            solutions = solutions.join("\n"),
        )
    }

    /// The report date: today, unless a demo override pins it.
    fn report_date(&self) -> String {
        match &self.date_override {
            Some(date) => date.clone(),
            None => Local::now().format("%B %-d, %Y").to_string(),
        }
    }
}
