//! Ranked tiers, divisions, and League Point deltas.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Ranked tier, in ascending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// Iron.
    Iron,
    /// Bronze.
    Bronze,
    /// Silver.
    Silver,
    /// Gold.
    Gold,
    /// Platinum.
    Platinum,
    /// Emerald.
    Emerald,
    /// Diamond.
    Diamond,
    /// Master (apex).
    Master,
    /// Grandmaster (apex).
    Grandmaster,
    /// Challenger (apex).
    Challenger,
}
impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 10] = [
        Tier::Iron,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Emerald,
        Tier::Diamond,
        Tier::Master,
        Tier::Grandmaster,
        Tier::Challenger,
    ];

    /// Provider string, e.g. `"GRANDMASTER"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Iron => "IRON",
            Tier::Bronze => "BRONZE",
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
            Tier::Platinum => "PLATINUM",
            Tier::Emerald => "EMERALD",
            Tier::Diamond => "DIAMOND",
            Tier::Master => "MASTER",
            Tier::Grandmaster => "GRANDMASTER",
            Tier::Challenger => "CHALLENGER",
        }
    }

    /// The top three tiers have no divisions and unbounded LP.
    pub const fn is_apex(self) -> bool {
        matches!(self, Tier::Master | Tier::Grandmaster | Tier::Challenger)
    }
}
impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown tier: `{}`.", s))
    }
}

/// Division within a tier. Declared lowest first, so `I` is the greatest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Division {
    /// Division IV (lowest).
    IV,
    /// Division III.
    III,
    /// Division II.
    II,
    /// Division I (highest).
    I,
}
impl Division {
    /// Provider string, e.g. `"III"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Division::IV => "IV",
            Division::III => "III",
            Division::II => "II",
            Division::I => "I",
        }
    }
}
impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for Division {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I" => Ok(Division::I),
            "II" => Ok(Division::II),
            "III" => Ok(Division::III),
            "IV" => Ok(Division::IV),
            other => Err(format!("Unknown division: `{}`.", other)),
        }
    }
}

/// A player's solo queue standing at one point in time.
///
/// `tier == None` means unranked, which orders below [`Tier::Iron`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct RankSnapshot {
    /// Tier, `None` if unranked.
    pub tier: Option<Tier>,
    /// Division, `None` if unranked.
    pub rank: Option<Division>,
    /// League points.
    pub league_points: i32,
}
impl RankSnapshot {
    /// Unranked, zero LP.
    pub const UNRANKED: Self = Self {
        tier: None,
        rank: None,
        league_points: 0,
    };

    /// If this snapshot has any ranked data.
    pub fn is_ranked(&self) -> bool {
        self.tier.is_some() || self.rank.is_some()
    }
}
impl PartialOrd for RankSnapshot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for RankSnapshot {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.tier, self.rank, self.league_points).cmp(&(
            other.tier,
            other.rank,
            other.league_points,
        ))
    }
}

/// Signed LP change from `previous` to `current`.
///
/// Raw LP is not comparable across a division or tier boundary, so each crossing credits (or
/// debits) the remainder of the old division plus progress into the new one, treating every
/// division as `0..=100`. A jump of several divisions or tiers is still counted as a single
/// division width.
pub fn lp_delta(previous: &RankSnapshot, current: &RankSnapshot) -> i32 {
    let (prev_lp, new_lp) = (previous.league_points, current.league_points);
    let promoted = (100 - prev_lp) + new_lp;
    let demoted = -(prev_lp + (100 - new_lp));

    match previous.tier.cmp(&current.tier) {
        Ordering::Equal => match previous.rank.cmp(&current.rank) {
            Ordering::Equal => new_lp - prev_lp,
            Ordering::Less => promoted,
            Ordering::Greater => demoted,
        },
        Ordering::Less => promoted,
        Ordering::Greater => demoted,
    }
}
