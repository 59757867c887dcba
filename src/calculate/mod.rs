//! Statistics calculation engine.
//!
//! Derives everything computed from stored war records:
//! - the player roster view
//! - the missed-hits view
//! - ranked leaderboards over trailing windows

pub mod leaderboard;
pub mod missed;
pub mod roster;

pub use leaderboard::{build_leaderboard, LeaderboardOptions};
pub use missed::build_missed_hits;
pub use roster::build_roster;

/// Three-star rate as a percentage. 0.0 when there are no attacks.
pub fn calculate_three_star_rate(three_stars: u32, attacks: u32) -> f64 {
    if attacks == 0 {
        0.0
    } else {
        three_stars as f64 / attacks as f64 * 100.0
    }
}

/// Display form of a rate, one decimal with a trailing '%'.
pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate)
}

/// Average stars per attack, rounded to two decimals.
pub fn calculate_average_stars(stars: u32, attacks: u32) -> f64 {
    if attacks == 0 {
        0.0
    } else {
        round_to(stars as f64 / attacks as f64, 2)
    }
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
