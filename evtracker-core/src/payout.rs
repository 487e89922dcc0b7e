//! Displayed → net payout conversion.
//!
//! The result screen shows gross balls; the net figure used for every
//! calculation subtracts the machine's ball-return commission. The two are
//! allowed to disagree and are never reconciled.

use crate::machine::PayoutRule;

/// Convert a displayed payout into net (calculation-use) balls.
///
/// Zero yields zero. Anything up to `base_disp` yields exactly `base_net`.
/// Above that, one ball per `unit` displayed balls of the excess is returned.
#[must_use]
pub fn displayed_to_net(displayed: u64, rule: &PayoutRule) -> u64 {
    if displayed == 0 {
        return 0;
    }
    if displayed <= rule.base_disp {
        return rule.base_net;
    }
    let excess = displayed - rule.base_disp;
    let returned = excess.checked_div(rule.unit).unwrap_or(0);
    rule.base_net + (excess - returned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values_follow_the_commission_rule() {
        let rule = PayoutRule::default();
        assert_eq!(displayed_to_net(0, &rule), 0);
        assert_eq!(displayed_to_net(1, &rule), 360);
        assert_eq!(displayed_to_net(400, &rule), 360);
        assert_eq!(displayed_to_net(401, &rule), 361);
        assert_eq!(displayed_to_net(415, &rule), 374);
        assert_eq!(displayed_to_net(1000, &rule), 920);
    }

    #[test]
    fn custom_rule_and_zero_unit() {
        let rule = PayoutRule {
            base_disp: 300,
            base_net: 280,
            unit: 10,
        };
        assert_eq!(displayed_to_net(250, &rule), 280);
        assert_eq!(displayed_to_net(400, &rule), 280 + 90);

        let no_return = PayoutRule { unit: 0, ..rule };
        assert_eq!(displayed_to_net(400, &no_return), 380);
    }
}
