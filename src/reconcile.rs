use std::collections::HashMap;

use crate::account::Account;

/// Merge a fresh poll into the list currently on screen.
///
/// The result holds exactly the polled identities, in polled order. For an
/// identity already known, the previous `code` and `requires_touch` survive
/// when the previous entry had less time left than the poll reports; any
/// other case takes the polled entry as is.
pub fn reconcile(previous: &[Account], polled: Vec<Account>) -> Vec<Account> {
    let known: HashMap<&str, &Account> = previous
        .iter()
        .map(|account| (account.identity.as_str(), account))
        .collect();

    polled
        .into_iter()
        .map(|mut next| {
            if let Some(prev) = known.get(next.identity.as_str()) {
                if prev.time_remaining < next.time_remaining {
                    next.code = prev.code.clone();
                    next.requires_touch = prev.requires_touch;
                }
            }
            next
        })
        .collect()
}

/// Store a code obtained by touch for its account.
///
/// Returns false when the account is no longer listed.
pub fn apply_resolved(accounts: &mut [Account], resolved: &Account) -> bool {
    match accounts
        .iter_mut()
        .find(|account| account.identity == resolved.identity)
    {
        Some(account) => {
            account.code = resolved.code.clone();
            account.requires_touch = false;
            account.time_remaining = resolved.time_remaining;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::TOUCH_MARKER;
    use pretty_assertions::assert_eq;

    fn account(identity: &str, code: &str, time_remaining: u64) -> Account {
        let mut account = Account::new(identity, code, 30, 0);
        account.time_remaining = time_remaining;
        account
    }

    #[test]
    fn previous_code_kept_when_it_had_less_time_left() {
        let previous = vec![account("GitHub", "654321", 12)];
        let polled = vec![account("GitHub", TOUCH_MARKER, 20)];

        let merged = reconcile(&previous, polled);

        assert_eq!(merged[0].code, "654321");
        assert!(!merged[0].requires_touch);
        assert_eq!(merged[0].time_remaining, 20);
    }

    #[test]
    fn polled_entry_wins_otherwise() {
        for prev_left in [20, 25, 30] {
            let previous = vec![account("GitHub", "654321", prev_left)];
            let polled = vec![account("GitHub", TOUCH_MARKER, 20)];

            let merged = reconcile(&previous, polled.clone());
            assert_eq!(merged, polled, "previous had {prev_left}s left");
        }
    }

    #[test]
    fn rule_applies_per_account() {
        let previous = vec![account("A", "111111", 5), account("B", "222222", 25)];
        let polled = vec![account("A", "333333", 29), account("B", "444444", 24)];

        let merged = reconcile(&previous, polled);
        let codes: Vec<_> = merged.iter().map(|a| a.code.as_str()).collect();

        assert_eq!(codes, vec!["111111", "444444"]);
    }

    #[test]
    fn result_follows_polled_identities() {
        let previous = vec![account("Gone", "111111", 1), account("Kept", "222222", 30)];
        let polled = vec![account("Kept", "333333", 28), account("New", "444444", 28)];

        let merged = reconcile(&previous, polled);
        let ids: Vec<_> = merged.iter().map(|a| a.identity.as_str()).collect();

        assert_eq!(ids, vec!["Kept", "New"]);
        assert_eq!(merged[0].code, "333333");
    }

    #[test]
    fn first_poll_is_taken_verbatim() {
        let polled = vec![account("A", "123456", 10)];
        assert_eq!(reconcile(&[], polled.clone()), polled);
    }

    #[test]
    fn resolved_code_replaces_marker() {
        let mut accounts = vec![account("GitHub", TOUCH_MARKER, 20), account("B", "1", 20)];
        let resolved = account("GitHub", "654321", 18);

        assert!(apply_resolved(&mut accounts, &resolved));
        assert_eq!(accounts[0].code, "654321");
        assert!(!accounts[0].requires_touch);
        assert_eq!(accounts[0].time_remaining, 18);
        assert_eq!(accounts[1].code, "1");
    }

    #[test]
    fn resolved_code_for_vanished_account_is_dropped() {
        let mut accounts = vec![account("B", "1", 20)];
        assert!(!apply_resolved(&mut accounts, &account("GitHub", "654321", 18)));
    }
}
