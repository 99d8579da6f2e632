//! Derived ratio of one or more numerator variables over a denominator.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ClassifyError;
use crate::frame::{Measurand, Observation, Selector, TimeSeriesQuery};

/// Unit carried by derived ratio rows
pub const RATIO_UNIT: &str = "ratio";

type RowKey = (String, String, String, i32);

fn row_key(obs: &Observation) -> RowKey {
    (obs.model.clone(), obs.scenario.clone(), obs.region.clone(), obs.year)
}

/// Build `sum(numerators) / denominator` for every row the selector keeps.
///
/// The selector's variable and unit are replaced for each fetch; its run,
/// region and year restrictions are shared. Every numerator must cover
/// exactly the rows of the denominator.
pub fn derived_ratio<Q: TimeSeriesQuery>(
    frame: &Q,
    numerators: &[String],
    denominator: &str,
    unit: &str,
    selector: &Selector,
) -> Result<Q, ClassifyError> {
    let fetch = |variable: &str| {
        let selector = selector.clone().measurand(&Measurand::new(variable, unit));
        frame.filter(&selector).observations().to_vec()
    };

    let misaligned = |variable: &str| ClassifyError::MisalignedDerivedRatio {
        variable: variable.to_string(),
        denominator: denominator.to_string(),
    };

    let denominator_rows = fetch(denominator);
    let mut sums: BTreeMap<RowKey, f64> = denominator_rows.iter().map(|o| (row_key(o), 0.0)).collect();
    if sums.len() != denominator_rows.len() {
        return Err(misaligned(denominator));
    }

    for numerator in numerators {
        let rows = fetch(numerator);
        // One row per denominator key, no gaps and no repeats
        let keys: BTreeSet<RowKey> = rows.iter().map(row_key).collect();
        if keys.len() != rows.len() || !keys.iter().eq(sums.keys()) {
            return Err(misaligned(numerator));
        }
        for obs in &rows {
            if let Some(sum) = sums.get_mut(&row_key(obs)) {
                *sum += obs.value;
            }
        }
    }

    let variable = format!("{}/{}", numerators.join("+"), denominator);
    let ratio = denominator_rows
        .iter()
        .map(|d| Observation {
            variable: variable.clone(),
            unit: RATIO_UNIT.to_string(),
            value: sums[&row_key(d)] / d.value,
            ..d.clone()
        })
        .collect();

    Ok(Q::from_observations(ratio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::obs;
    use crate::frame::IamFrame;

    fn energy() -> IamFrame {
        IamFrame::new(vec![
            obs(("m", "s"), "Primary Energy|Wind", "EJ/yr", 2030, 10.0),
            obs(("m", "s"), "Primary Energy|Wind", "EJ/yr", 2050, 10.0),
            obs(("m", "s"), "Primary Energy|Solar", "EJ/yr", 2030, 5.0),
            obs(("m", "s"), "Primary Energy|Solar", "EJ/yr", 2050, 15.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2030, 20.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2050, 40.0),
        ])
    }

    fn values(frame: &IamFrame) -> Vec<f64> {
        frame.data().iter().map(|o| o.value).collect()
    }

    #[test]
    fn test_single_numerator() {
        let ratio = derived_ratio(
            &energy(),
            &["Primary Energy|Wind".to_string()],
            "Primary Energy",
            "EJ/yr",
            &Selector::new().region("World"),
        )
        .unwrap();
        assert_eq!(values(&ratio), vec![0.5, 0.25]);
        assert!(ratio.data().iter().all(|o| o.unit == RATIO_UNIT));
    }

    #[test]
    fn test_numerators_are_summed() {
        let ratio = derived_ratio(
            &energy(),
            &["Primary Energy|Wind".to_string(), "Primary Energy|Solar".to_string()],
            "Primary Energy",
            "EJ/yr",
            &Selector::new().year(2050),
        )
        .unwrap();
        assert_eq!(values(&ratio), vec![25.0 / 40.0]);
        assert_eq!(ratio.data()[0].variable, "Primary Energy|Wind+Primary Energy|Solar/Primary Energy");
    }

    #[test]
    fn test_misaligned_rows_fail() {
        let mut rows = energy().data().to_vec();
        rows.retain(|o| !(o.variable == "Primary Energy|Solar" && o.year == 2030));
        let err = derived_ratio(
            &IamFrame::new(rows),
            &["Primary Energy|Solar".to_string()],
            "Primary Energy",
            "EJ/yr",
            &Selector::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::MisalignedDerivedRatio { ref variable, .. } if variable == "Primary Energy|Solar"
        ));
    }

    #[test]
    fn test_repeated_row_does_not_cover_a_gap() {
        // Two 2050 rows and no 2030 row: same count as the denominator
        let frame = IamFrame::new(vec![
            obs(("m", "s"), "Primary Energy|Wind", "EJ/yr", 2050, 10.0),
            obs(("m", "s"), "Primary Energy|Wind", "EJ/yr", 2050, 10.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2030, 20.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2050, 40.0),
        ]);
        let err = derived_ratio(&frame, &["Primary Energy|Wind".to_string()], "Primary Energy", "EJ/yr", &Selector::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::MisalignedDerivedRatio { ref variable, .. } if variable == "Primary Energy|Wind"
        ));
    }

    #[test]
    fn test_repeated_denominator_row_fails() {
        let frame = IamFrame::new(vec![
            obs(("m", "s"), "Primary Energy|Wind", "EJ/yr", 2050, 10.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2050, 40.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2050, 40.0),
        ]);
        let err = derived_ratio(&frame, &["Primary Energy|Wind".to_string()], "Primary Energy", "EJ/yr", &Selector::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::MisalignedDerivedRatio { ref variable, .. } if variable == "Primary Energy"
        ));
    }

    #[test]
    fn test_zero_denominator_follows_ieee() {
        let frame = IamFrame::new(vec![
            obs(("m", "s"), "Primary Energy|Wind", "EJ/yr", 2050, 1.0),
            obs(("m", "s"), "Primary Energy", "EJ/yr", 2050, 0.0),
        ]);
        let ratio = derived_ratio(&frame, &["Primary Energy|Wind".to_string()], "Primary Energy", "EJ/yr", &Selector::new()).unwrap();
        assert!(ratio.data()[0].value.is_infinite());
    }
}
