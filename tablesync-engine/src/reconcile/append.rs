use crate::index::KeyIndex;
use crate::plan::{Insert, KeyOutcome, MutationPlan, Outcome};
use tablesync_types::Side;

/// Bidirectional union: keys present on one side only are appended to the
/// other. Rows on both sides are left alone and nothing is deleted.
#[must_use]
pub fn append_only(sheet: &KeyIndex, remote: &KeyIndex) -> MutationPlan {
    let mut plan = MutationPlan::default();

    for (from, into, other, outcome) in [
        (sheet, Side::Remote, remote, Outcome::OnlyA),
        (remote, Side::Sheet, sheet, Outcome::OnlyB),
    ] {
        for row in from.iter() {
            let key = row.record.key();
            if other.contains(key) {
                if into == Side::Remote {
                    plan.outcomes.push(KeyOutcome {
                        key: key.clone(),
                        outcome: Outcome::Concordant,
                    });
                }
                continue;
            }
            plan.inserts.push(Insert {
                side: into,
                key: key.clone(),
                record: row.record.clone(),
            });
            plan.outcomes.push(KeyOutcome {
                key: key.clone(),
                outcome,
            });
        }
    }

    plan
}
