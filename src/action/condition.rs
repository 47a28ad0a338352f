//! 判定等级 + 触发条件 → 是否立即执行

use crate::rule::{ResultCondition, VerdictTier};

/// 条件求值器（纯函数，无状态）
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    #[inline]
    pub fn evaluate(condition: ResultCondition, tier: VerdictTier) -> bool {
        match condition {
            ResultCondition::OnWarning => tier == VerdictTier::Warning,
            ResultCondition::OnBad => tier == VerdictTier::Bad,
            ResultCondition::OnBoth => matches!(tier, VerdictTier::Warning | VerdictTier::Bad),
            ResultCondition::NoDisable | ResultCondition::NoRedirect => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: [VerdictTier; 3] = [VerdictTier::Good, VerdictTier::Warning, VerdictTier::Bad];

    #[test]
    fn test_on_both() {
        assert!(!ConditionEvaluator::evaluate(ResultCondition::OnBoth, VerdictTier::Good));
        assert!(ConditionEvaluator::evaluate(ResultCondition::OnBoth, VerdictTier::Warning));
        assert!(ConditionEvaluator::evaluate(ResultCondition::OnBoth, VerdictTier::Bad));
    }

    #[test]
    fn test_single_tier_conditions() {
        assert!(ConditionEvaluator::evaluate(ResultCondition::OnWarning, VerdictTier::Warning));
        assert!(!ConditionEvaluator::evaluate(ResultCondition::OnWarning, VerdictTier::Bad));
        assert!(ConditionEvaluator::evaluate(ResultCondition::OnBad, VerdictTier::Bad));
        assert!(!ConditionEvaluator::evaluate(ResultCondition::OnBad, VerdictTier::Warning));
    }

    #[test]
    fn test_disabled_conditions_never_fire() {
        for tier in TIERS {
            assert!(!ConditionEvaluator::evaluate(ResultCondition::NoDisable, tier));
            assert!(!ConditionEvaluator::evaluate(ResultCondition::NoRedirect, tier));
        }
    }
}
