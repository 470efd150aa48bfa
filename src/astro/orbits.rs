//! Text render of an exoplanet system as emoji on concentric orbits

use crate::random::RandomSource;

use super::ExoPlanet;

const BLANK: &str = "\u{3000}";
const SUN: &str = "\u{2600}\u{FE0F}";

/// Fewest orbits drawn, however small the system
pub const MIN_RENDER_ORBITS: usize = 8;

/// Eight positions around each orbit, clockwise from the top
const ORIENTATIONS: usize = 8;

/// Emoji placed at `(orbit, orientation)`, blank elsewhere
struct Placements {
    cells: Vec<[String; ORIENTATIONS]>,
}

impl Placements {
    fn new(n_orbits: usize) -> Self {
        Self {
            cells: (0..n_orbits)
                .map(|_| std::array::from_fn(|_| BLANK.to_string()))
                .collect(),
        }
    }

    fn get(&self, orbit: usize, orientation: usize) -> &str {
        &self.cells[orbit][orientation]
    }
}

fn pad(n: usize) -> String {
    BLANK.repeat(n)
}

/// Assign each planet (sorted by radius) to an orbit by normalized radius,
/// taking the first free orbit at or just inside its slot. Planets with no
/// free orbit left are not drawn.
fn assign_orbits(system: &[&ExoPlanet], n_orbits: usize) -> Vec<String> {
    let radii: Vec<f64> = system
        .iter()
        .enumerate()
        .map(|(i, p)| p.radius_in_earths + 0.0001 * i as f64)
        .collect();

    let normalized: Vec<f64> = if radii.len() > 1 {
        let min = radii.iter().copied().fold(f64::INFINITY, f64::min);
        let max = radii.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        radii
            .iter()
            .map(|r| if range > 0.0 { (r - min) / range } else { 0.0 })
            .collect()
    } else {
        vec![0.0; radii.len()]
    };

    let mut orbits = vec![BLANK.to_string(); n_orbits];
    for (norm, planet) in normalized.iter().zip(system) {
        let slot = (norm * (n_orbits - 1) as f64).floor() as usize;
        let start = slot.saturating_sub(1);
        if let Some(free) = orbits[start..].iter_mut().find(|o| o.as_str() == BLANK) {
            *free = planet.planet_emoji.clone();
        }
    }
    orbits
}

fn layout(cells: &Placements, n: usize, is_circumbinary: bool) -> Vec<String> {
    let mut rows = Vec::with_capacity(2 * n + 2);

    for idx in (0..n).rev() {
        let edge = pad(n - idx - 1);
        let gap = pad(idx);
        rows.push(format!(
            "{edge}{}{gap}{}{gap}{}{edge}",
            cells.get(idx, 7),
            cells.get(idx, 0),
            cells.get(idx, 1)
        ));
    }

    let evens = (0..n).step_by(2);
    let odds = (1..n).step_by(2);

    if is_circumbinary {
        let (top, bottom) = if n % 2 == 0 {
            let left: String = evens.clone().rev().map(|i| format!("{}{BLANK}", cells.get(i, 6))).collect();
            let right: String = evens.map(|i| format!("{}{BLANK}", cells.get(i, 2))).collect();
            let low_left: String = odds.clone().rev().map(|i| format!("{BLANK}{}", cells.get(i, 6))).collect();
            let low_right: String = odds.map(|i| format!("{BLANK}{}", cells.get(i, 2))).collect();
            (
                format!("{left}{SUN}{right}"),
                format!("{low_left}{SUN}{low_right}"),
            )
        } else {
            let left = evens
                .clone()
                .rev()
                .map(|i| cells.get(i, 6))
                .collect::<Vec<_>>()
                .join(BLANK);
            let right: String = odds.clone().map(|i| format!("{BLANK}{}", cells.get(i, 2))).collect();
            let low_left: String = odds.rev().map(|i| format!("{BLANK}{}", cells.get(i, 6))).collect();
            let low_right: String = evens.map(|i| format!("{}{BLANK}", cells.get(i, 2))).collect();
            (
                format!("{left}{SUN}{right}"),
                format!("{low_left}{BLANK}{SUN}{low_right}"),
            )
        };
        rows.push(top);
        rows.push(bottom);
    } else {
        let left: String = (0..n).rev().map(|i| cells.get(i, 6)).collect();
        let right: String = (0..n).map(|i| cells.get(i, 2)).collect();
        rows.push(format!("{left}{SUN}{right}"));
    }

    for idx in 0..n {
        let edge = pad(n - idx - 1);
        let gap = pad(idx);
        rows.push(format!(
            "{edge}{}{gap}{}{gap}{}{edge}",
            cells.get(idx, 5),
            cells.get(idx, 4),
            cells.get(idx, 3)
        ));
    }

    rows
}

/// Drop leading and trailing blank lines and trailing padding
fn compress(rows: &[String]) -> String {
    let lines: Vec<&str> = rows.iter().flat_map(|r| r.split('\n')).collect();

    let mut kept: Vec<&str> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !line.trim().is_empty() {
            kept.push(line.trim_end());
        } else if kept.is_empty() {
            continue;
        } else if lines[idx..].iter().all(|l| l.trim().is_empty()) {
            break;
        } else {
            kept.push(line.trim_end());
        }
    }
    kept.join("\n")
}

/// Render a host system. Each orbit is drawn at one of eight orientations
/// picked from `rng`; circumbinary systems get two suns.
pub fn render_system(system: &[ExoPlanet], rng: &dyn RandomSource) -> String {
    if system.is_empty() {
        return String::new();
    }

    let mut sorted: Vec<&ExoPlanet> = system.iter().collect();
    sorted.sort_by(|a, b| a.radius_in_earths.total_cmp(&b.radius_in_earths));

    let n_orbits = MIN_RENDER_ORBITS.max(sorted.len());
    let orbits = assign_orbits(&sorted, n_orbits);

    let mut cells = Placements::new(n_orbits);
    for (orbit, emoji) in orbits.into_iter().enumerate() {
        let orientation = rng.below(ORIENTATIONS);
        cells.cells[orbit][orientation] = emoji;
    }

    let is_circumbinary = system.iter().any(|p| p.is_circumbinary);
    compress(&layout(&cells, n_orbits, is_circumbinary))
}
