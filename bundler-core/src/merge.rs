//! Folding several observations of the same place into one approximation.

use crate::model::{Observation, WindDirection};

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

/// Merge observations field by field.
///
/// Each numeric field is averaged over the observations that carry it, so a
/// provider missing one field does not dilute the others. A field nobody
/// supplied stays absent. The wind direction is the most frequent label,
/// `None` included; ties go to the label that reached the top count first in
/// input order.
pub fn merge<'a, I>(observations: I) -> Observation
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut temperature = Mean::default();
    let mut humidity = Mean::default();
    let mut pressure = Mean::default();
    let mut wind_speed = Mean::default();
    let mut directions: Vec<WindDirection> = Vec::new();

    for obs in observations {
        temperature.push(obs.temperature);
        humidity.push(obs.humidity);
        pressure.push(obs.pressure);
        wind_speed.push(obs.wind_speed);
        directions.push(obs.wind_direction);
    }

    Observation {
        temperature: temperature.value(),
        humidity: humidity.value(),
        pressure: pressure.value(),
        wind_speed: wind_speed.value(),
        wind_direction: modal_direction(&directions),
    }
}

fn modal_direction(directions: &[WindDirection]) -> WindDirection {
    let mut best = WindDirection::None;
    let mut best_count = 0;

    for dir in directions {
        let count = directions.iter().filter(|d| *d == dir).count();
        if count > best_count {
            best = *dir;
            best_count = count;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(t: Option<f64>) -> Observation {
        Observation { temperature: t, ..Observation::empty() }
    }

    fn wind(dir: WindDirection) -> Observation {
        Observation { wind_direction: dir, ..Observation::empty() }
    }

    #[test]
    fn averages_only_over_contributors() {
        let input = [temp(Some(20.0)), temp(Some(22.0)), temp(None), Observation::empty()];
        let merged = merge(&input);
        assert_eq!(merged.temperature, Some(21.0));
        assert_eq!(merged.humidity, None);
    }

    #[test]
    fn fields_have_independent_denominators() {
        let a = Observation {
            temperature: Some(10.0),
            pressure: Some(750.0),
            ..Observation::empty()
        };
        let b = Observation { temperature: Some(14.0), ..Observation::empty() };
        let merged = merge(&[a, b]);
        assert_eq!(merged.temperature, Some(12.0));
        assert_eq!(merged.pressure, Some(750.0));
    }

    #[test]
    fn empty_merges_to_empty() {
        assert!(merge(&[]).is_empty());
        let merged = merge(&[Observation::empty(), Observation::empty()]);
        assert!(merged.is_empty());
    }

    #[test]
    fn singleton_merge_is_identity() {
        let obs = Observation {
            temperature: Some(-3.5),
            humidity: Some(81.0),
            pressure: Some(741.0),
            wind_speed: Some(4.2),
            wind_direction: WindDirection::NW,
        };
        assert_eq!(merge(&[obs]), obs);
    }

    #[test]
    fn numeric_fields_ignore_order() {
        let a = Observation { temperature: Some(1.0), humidity: Some(50.0), ..Observation::empty() };
        let b = Observation { temperature: Some(2.0), wind_speed: Some(3.0), ..Observation::empty() };
        let c = Observation { temperature: Some(6.0), humidity: Some(70.0), ..Observation::empty() };

        let forward = merge(&[a, b, c]);
        let backward = merge(&[c, b, a]);
        assert_eq!(forward.temperature, backward.temperature);
        assert_eq!(forward.humidity, backward.humidity);
        assert_eq!(forward.wind_speed, backward.wind_speed);
        assert_eq!(forward.temperature, Some(3.0));
    }

    #[test]
    fn wind_direction_is_the_mode() {
        let input = [
            wind(WindDirection::E),
            wind(WindDirection::SW),
            wind(WindDirection::SW),
            wind(WindDirection::E),
            wind(WindDirection::SW),
        ];
        assert_eq!(merge(&input).wind_direction, WindDirection::SW);
    }

    #[test]
    fn wind_direction_tie_goes_to_first_in_order() {
        let ab = [wind(WindDirection::S), wind(WindDirection::N)];
        let ba = [wind(WindDirection::N), wind(WindDirection::S)];
        assert_eq!(merge(&ab).wind_direction, WindDirection::S);
        assert_eq!(merge(&ba).wind_direction, WindDirection::N);
    }

    #[test]
    fn unknown_direction_takes_part_in_the_vote() {
        let input = [Observation::empty(), Observation::empty(), wind(WindDirection::W)];
        assert_eq!(merge(&input).wind_direction, WindDirection::None);
    }

    #[test]
    fn full_circle_and_zero_bearings_merge_to_north() {
        // 0° classifies as unknown, so the north reading wins the tie by coming first.
        let a = wind(crate::wind::classify(Some(360.0)));
        let b = wind(crate::wind::classify(Some(0.0)));
        assert_eq!(merge(&[a, b]).wind_direction, WindDirection::N);

        let c = wind(crate::wind::classify(Some(355.0)));
        assert_eq!(merge(&[b, a, c]).wind_direction, WindDirection::N);
    }
}
