//! Prompt assembly.
//!
//! Pure functions over [`RacingInfo`]; the same snapshot always renders to the
//! same text.

use pitwall_types::RacingInfo;

/// System-role framing sent with every request.
pub const SYSTEM_PROMPT: &str = "\
You are an expert racing analyst and coach for sim-racing and sim-rally.
You have access to real-time telemetry and racing information from a simulator.
Values reported as \"unknown\" were not available from the simulator; do not guess them.
Provide clear, actionable insights and advice based on the data provided.
Be concise but informative.";

const ANALYSIS_REQUEST: &str = "\
Please provide an analysis of the current racing situation including:
1. Overall position and performance
2. Vehicle status and any concerns
3. Recommendations for improvement";

const QUESTION_REQUEST: &str =
    "Please provide a detailed response to the query based on the racing data.";

/// Render the three snapshot sections as indented `key: value` lines.
pub fn format_racing_info(info: &RacingInfo) -> String {
    info.sections()
        .iter()
        .map(|section| {
            let mut block = format!("{}:", section.title());
            for (key, value) in section.entries() {
                block.push_str(&format!("\n  - {key}: {value}"));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn analysis_prompt(info: &RacingInfo) -> String {
    format!(
        "Current racing situation:\n{}\n\n{ANALYSIS_REQUEST}",
        format_racing_info(info)
    )
}

pub fn question_prompt(question: &str, info: &RacingInfo) -> String {
    format!(
        "Current racing situation:\n{}\n\nQuery: {}\n\n{QUESTION_REQUEST}",
        format_racing_info(info),
        question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_types::{RaceSituation, TrackInfo, VehicleTelemetry};

    fn sample() -> RacingInfo {
        RacingInfo {
            situation: RaceSituation {
                position: Some(1),
                lap: Some(5),
                ..Default::default()
            },
            telemetry: VehicleTelemetry {
                rpm: Some(7500.0),
                gear: Some(4),
                ..Default::default()
            },
            track: TrackInfo {
                name: Some("Silverstone".into()),
                weather: Some("Sunny".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn formatted_info_has_all_sections_and_values() {
        let text = format_racing_info(&sample());
        assert!(text.contains("Race Situation:"));
        assert!(text.contains("  - position: 1"));
        assert!(text.contains("  - lap: 5"));
        assert!(text.contains("Telemetry:"));
        assert!(text.contains("  - rpm: 7500"));
        assert!(text.contains("  - gear: 4"));
        assert!(text.contains("Track Information:"));
        assert!(text.contains("  - name: Silverstone"));
        assert!(text.contains("  - weather: Sunny"));
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let text = format_racing_info(&sample());
        let situation = text.find("Race Situation:").unwrap();
        let telemetry = text.find("Telemetry:").unwrap();
        let track = text.find("Track Information:").unwrap();
        assert!(situation < telemetry && telemetry < track);
    }

    #[test]
    fn formatting_is_deterministic() {
        let info = sample();
        assert_eq!(analysis_prompt(&info), analysis_prompt(&info));
    }

    #[test]
    fn unknown_values_are_spelled_out() {
        let text = format_racing_info(&RacingInfo::default());
        assert!(text.contains("  - speed_kph: unknown"));
        assert!(text.contains("  - name: unknown"));
    }

    #[test]
    fn question_prompt_interpolates_the_query() {
        let prompt = question_prompt("  How can I improve my lap times? ", &sample());
        assert!(prompt.contains("Query: How can I improve my lap times?\n"));
        assert!(prompt.contains("  - name: Silverstone"));
        assert!(!prompt.contains("Overall position and performance"));
    }

    #[test]
    fn analysis_prompt_asks_for_the_three_topics() {
        let prompt = analysis_prompt(&sample());
        assert!(prompt.contains("1. Overall position and performance"));
        assert!(prompt.contains("3. Recommendations for improvement"));
    }
}
