use crate::types::{Mention, SentimentLabel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub total: u64,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub count: u64,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub average_score: f64,
}

#[derive(Default)]
struct Tally {
    count: u64,
    positive: u64,
    neutral: u64,
    negative: u64,
    score_sum: u64,
}

impl Tally {
    fn add(&mut self, mention: &Mention) {
        self.count += 1;
        self.score_sum += mention.effective_score() as u64;
        match mention.effective_label() {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.score_sum as f64 / self.count as f64
        }
    }
}

/// Label counts and mean score, honoring manual overrides.
pub fn summarize(mentions: &[Mention]) -> SentimentSummary {
    let mut tally = Tally::default();
    for mention in mentions {
        tally.add(mention);
    }
    SentimentSummary {
        total: tally.count,
        positive: tally.positive,
        neutral: tally.neutral,
        negative: tally.negative,
        average_score: tally.average(),
    }
}

/// Per-UTC-day breakdown, oldest day first. Days without mentions are omitted.
pub fn daily_series(mentions: &[Mention]) -> Vec<DailySentiment> {
    let mut days: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    for mention in mentions {
        days.entry(mention.created_utc.date_naive())
            .or_default()
            .add(mention);
    }

    days.into_iter()
        .map(|(date, tally)| DailySentiment {
            date,
            count: tally.count,
            positive: tally.positive,
            neutral: tally.neutral,
            negative: tally.negative,
            average_score: tally.average(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ManualTag, MentionKind, RawMention, SentimentResult};
    use chrono::{TimeZone, Utc};

    fn mention(id: &str, day: u32, hour: u32, label: SentimentLabel, score: u8) -> Mention {
        let raw = RawMention {
            id: id.to_string(),
            kind: MentionKind::Post,
            subreddit: "test".to_string(),
            author: None,
            title: Some("t".to_string()),
            body: None,
            permalink: None,
            created_utc: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        };
        let result = SentimentResult {
            label,
            confidence: 0.7,
            score,
            reasons: vec![],
        };
        Mention::from_raw(raw, result, vec![])
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = summarize(&[]);
        assert_eq!(summary, SentimentSummary::default());
    }

    #[test]
    fn test_summary_uses_effective_values() {
        let mut tagged = mention("t3_c", 1, 10, SentimentLabel::Negative, 20);
        tagged.manual = Some(ManualTag {
            label: SentimentLabel::Positive,
            score: 90,
            tagged_by: "ops".to_string(),
            tagged_at: Utc::now(),
        });
        let mentions = vec![
            mention("t3_a", 1, 10, SentimentLabel::Positive, 94),
            mention("t3_b", 1, 11, SentimentLabel::Neutral, 50),
            tagged,
        ];

        let summary = summarize(&mentions);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.positive, 2);
        assert_eq!(summary.neutral, 1);
        assert_eq!(summary.negative, 0);
        assert!((summary.average_score - (94.0 + 50.0 + 90.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_series_groups_by_utc_date() {
        let mentions = vec![
            mention("t3_a", 2, 23, SentimentLabel::Negative, 14),
            mention("t3_b", 1, 0, SentimentLabel::Positive, 78),
            mention("t3_c", 2, 1, SentimentLabel::Positive, 86),
        ];

        let series = daily_series(&mentions);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(series[0].count, 1);
        assert_eq!(series[1].count, 2);
        assert_eq!(series[1].negative, 1);
        assert_eq!(series[1].positive, 1);
        assert!((series[1].average_score - 50.0).abs() < 1e-9);
    }
}
