// src/services/classifier.rs

//! Threshold-based abnormality classification of questionnaire scores.

use crate::config::DEFAULT_SCORE_THRESHOLD;

/// A questionnaire dimension that takes part in abnormality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Anxiety,
    Depression,
    Stress,
}

impl Module {
    /// Classified modules in evaluation order. Flagged modules are reported
    /// in this order.
    pub const ALL: [Module; 3] = [Module::Anxiety, Module::Depression, Module::Stress];

    /// Label used in payloads, stored score rows and summaries.
    pub fn label(self) -> &'static str {
        match self {
            Module::Anxiety => "焦虑",
            Module::Depression => "抑郁",
            Module::Stress => "压力",
        }
    }
}

/// Per-module threshold lookup. Modules without an entry use the default.
pub fn threshold_for(module_name: &str) -> i64 {
    const THRESHOLDS: [(&str, i64); 3] = [("焦虑", 15), ("抑郁", 15), ("压力", 15)];

    THRESHOLDS
        .iter()
        .find(|(name, _)| *name == module_name)
        .map(|(_, threshold)| *threshold)
        .unwrap_or(DEFAULT_SCORE_THRESHOLD)
}

/// A score is abnormal only when present and strictly above the threshold.
pub fn is_score_abnormal(score: Option<i64>, module_name: &str) -> bool {
    match score {
        Some(score) => score > threshold_for(module_name),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_abnormal: bool,
    /// Flagged modules in evaluation order.
    pub abnormal_modules: Vec<Module>,
}

impl Classification {
    pub fn abnormal_labels(&self) -> Vec<&'static str> {
        self.abnormal_modules.iter().map(|m| m.label()).collect()
    }
}

/// Classifies the three fixed modules independently and ORs the flags.
pub fn classify(anxiety: Option<i64>, depression: Option<i64>, stress: Option<i64>) -> Classification {
    let abnormal_modules: Vec<Module> = [
        (Module::Anxiety, anxiety),
        (Module::Depression, depression),
        (Module::Stress, stress),
    ]
    .into_iter()
    .filter(|(module, score)| is_score_abnormal(*score, module.label()))
    .map(|(module, _)| module)
    .collect();

    Classification {
        is_abnormal: !abnormal_modules.is_empty(),
        abnormal_modules,
    }
}

/// Prefixes the summary with a warning naming the flagged modules.
/// Returns the summary untouched when nothing was flagged.
pub fn annotate_summary(summary: Option<&str>, classification: &Classification) -> Option<String> {
    let labels = classification.abnormal_labels();
    let prefix = match labels.as_slice() {
        [] => return summary.map(str::to_string),
        [single] => format!("检测出{}风险，建议进一步评估。", single),
        many => format!(
            "检测出多维度异常（{}），建议重点关注和进一步评估。",
            many.join(", ")
        ),
    };

    Some(format!("{}{}", prefix, summary.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_module_keyed_with_default() {
        for module in Module::ALL {
            assert_eq!(threshold_for(module.label()), 15);
        }
        assert_eq!(threshold_for("学习焦虑"), DEFAULT_SCORE_THRESHOLD);
    }

    #[test]
    fn boundary_is_strictly_greater_than() {
        for module in Module::ALL {
            let t = threshold_for(module.label());
            assert!(!is_score_abnormal(Some(t), module.label()));
            assert!(is_score_abnormal(Some(t + 1), module.label()));
        }
    }

    #[test]
    fn missing_scores_never_flag() {
        assert!(!is_score_abnormal(None, "焦虑"));
        let c = classify(None, None, None);
        assert!(!c.is_abnormal);
        assert!(c.abnormal_modules.is_empty());
    }

    #[test]
    fn each_module_is_judged_on_its_own_score() {
        let c = classify(None, Some(16), Some(15));
        assert_eq!(c.abnormal_modules, vec![Module::Depression]);

        let c = classify(Some(16), None, Some(99));
        assert_eq!(c.abnormal_modules, vec![Module::Anxiety, Module::Stress]);
    }

    #[test]
    fn nothing_flagged_leaves_summary_alone() {
        let c = classify(Some(15), Some(0), Some(10));
        assert!(!c.is_abnormal);
        assert_eq!(
            annotate_summary(Some("状态整体稳定。"), &c).as_deref(),
            Some("状态整体稳定。")
        );
        assert_eq!(annotate_summary(None, &c), None);
    }

    #[test]
    fn single_module_template() {
        let c = classify(Some(18), Some(8), Some(12));
        assert!(c.is_abnormal);
        assert_eq!(c.abnormal_labels(), vec!["焦虑"]);
        assert_eq!(
            annotate_summary(Some("原始总结"), &c).as_deref(),
            Some("检测出焦虑风险，建议进一步评估。原始总结")
        );
    }

    #[test]
    fn multi_module_template_in_evaluation_order() {
        let c = classify(Some(20), Some(16), Some(8));
        assert_eq!(c.abnormal_labels(), vec!["焦虑", "抑郁"]);
        assert_eq!(
            annotate_summary(Some("原始总结"), &c).as_deref(),
            Some("检测出多维度异常（焦虑, 抑郁），建议重点关注和进一步评估。原始总结")
        );

        let c = classify(Some(30), Some(30), Some(30));
        assert_eq!(
            annotate_summary(None, &c).as_deref(),
            Some("检测出多维度异常（焦虑, 抑郁, 压力），建议重点关注和进一步评估。")
        );
    }
}
