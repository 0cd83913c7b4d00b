//! Elimination bracket resolution.
//!
//! The bracket is a complete binary tree of best-of-three series keyed by
//! `(round, group)`, where the round index halves toward the final:
//! 8 = eighthfinal, 4 = quarterfinal, 2 = semifinal, 1 = final. Resolution is
//! idempotent: re-running against unchanged results produces no changes.

use std::cmp::Reverse;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::error::ArenaError;
use crate::models::{Alliance, Match, MatchStatus, MatchType};
use crate::store::Store;

/// Seed positions for a 16-slot bracket; scaled down for shallower brackets.
pub const SEED_ORDER: [u32; 16] = [1, 16, 8, 9, 4, 13, 5, 12, 2, 15, 7, 10, 3, 14, 6, 11];

/// Structural problem with the alliance list that prevents building a bracket.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    /// A bracket needs two alliances to have anything to play.
    #[error("must have at least 2 alliances")]
    TooFewAlliances,
    /// More alliances than the deepest supported round can hold.
    #[error("round of depth {0} is not supported")]
    UnsupportedDepth(u32),
    /// An alliance cannot field a full match lineup.
    #[error("alliances must consist of at least 3 teams")]
    IncompleteAlliance,
}

/// Store changes produced by one resolution pass.
#[derive(Debug, Default)]
pub struct BracketOutcome {
    /// Matches to insert; ids are assigned by the store.
    pub created: Vec<Match>,
    /// Existing matches whose slots or schedule changed.
    pub updated: Vec<Match>,
    /// Surplus matches to remove.
    pub deleted_ids: Vec<i64>,
    /// Tournament-winning alliance number, once the final is decided.
    pub winner: Option<u32>,
}

impl BracketOutcome {
    /// Whether this pass changed anything.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted_ids.is_empty()
    }
}

struct WorkingMatch {
    inner: Match,
    is_new: bool,
    dirty: bool,
}

struct BracketContext<'a, R: Rng> {
    alliances: &'a [Alliance],
    alliance_count: u32,
    leaf_round: u32,
    matches: Vec<WorkingMatch>,
    deleted_ids: Vec<i64>,
    rng: &'a mut R,
}

/// Rebuild the bracket from the current alliances and playoff matches.
///
/// `existing` must be every playoff match in the store; `start_time` and
/// `spacing` place the not-yet-played matches on the clock. The shuffled team
/// orders are drawn from `rng`, so a seeded generator makes the outcome
/// reproducible.
pub fn resolve_bracket<R: Rng>(
    alliances: &[Alliance],
    existing: &[Match],
    start_time: OffsetDateTime,
    spacing: Duration,
    rng: &mut R,
) -> Result<BracketOutcome, BracketError> {
    if alliances.len() < 2 {
        return Err(BracketError::TooFewAlliances);
    }
    if alliances.iter().any(|alliance| alliance.lineup().is_none()) {
        return Err(BracketError::IncompleteAlliance);
    }
    let alliance_count = alliances.len() as u32;
    let leaf_round = leaf_round(alliance_count)?;

    let mut ctx = BracketContext {
        alliances,
        alliance_count,
        leaf_round,
        matches: existing
            .iter()
            .map(|m| WorkingMatch {
                inner: m.clone(),
                is_new: false,
                dirty: false,
            })
            .collect(),
        deleted_ids: Vec::new(),
        rng,
    };

    let winner = resolve_series(&mut ctx, 1, 1);
    schedule(&mut ctx, start_time, spacing);

    let mut outcome = BracketOutcome {
        deleted_ids: ctx.deleted_ids,
        winner,
        ..BracketOutcome::default()
    };
    for working in ctx.matches {
        if working.is_new {
            outcome.created.push(working.inner);
        } else if working.dirty {
            outcome.updated.push(working.inner);
        }
    }
    Ok(outcome)
}

/// Run a resolution pass and apply its changes to the store.
///
/// Changes already applied are not rolled back if a later write fails; the
/// next pass picks up from whatever state the store is in.
pub async fn update_playoff_bracket<R: Rng>(
    store: &dyn Store,
    start_time: OffsetDateTime,
    spacing: Duration,
    rng: &mut R,
) -> Result<Option<u32>, ArenaError> {
    let alliances = store.list_alliances().await?;
    let existing = store.list_matches(MatchType::Playoff).await?;
    let outcome = resolve_bracket(&alliances, &existing, start_time, spacing, rng)?;

    if !outcome.is_empty() {
        info!(
            created = outcome.created.len(),
            updated = outcome.updated.len(),
            deleted = outcome.deleted_ids.len(),
            "updating playoff bracket"
        );
    }
    for id in &outcome.deleted_ids {
        store.delete_match(*id).await?;
    }
    for m in &outcome.updated {
        store.update_match(m.clone()).await?;
    }
    for m in &outcome.created {
        store.create_match(m.clone()).await?;
    }
    Ok(outcome.winner)
}

/// Smallest round that can hold `alliance_count` alliances.
fn leaf_round(alliance_count: u32) -> Result<u32, BracketError> {
    for round in [1, 2, 4, 8] {
        if 2 * round >= alliance_count {
            return Ok(round);
        }
    }
    Err(BracketError::UnsupportedDepth(32))
}

/// Alliance seeded into `slot` (1-based) of `round`.
fn seed_at(round: u32, slot: u32) -> u32 {
    (SEED_ORDER[(slot - 1) as usize] * round).div_ceil(8)
}

fn series_name(round: u32, group: u32, instance: u32) -> String {
    match round {
        1 => format!("F-{instance}"),
        2 => format!("SF{group}-{instance}"),
        4 => format!("QF{group}-{instance}"),
        _ => format!("EF{group}-{instance}"),
    }
}

/// Resolve the series at `(round, group)`, recursing into its feeder series
/// first. Returns the winning alliance number once the series is decided.
fn resolve_series<R: Rng>(
    ctx: &mut BracketContext<'_, R>,
    round: u32,
    group: u32,
) -> Option<u32> {
    let (red, blue) = if round == ctx.leaf_round {
        let red_seed = seed_at(round, 2 * group - 1);
        let blue_seed = seed_at(round, 2 * group);
        if blue_seed > ctx.alliance_count {
            // Bye: the higher seed advances without playing.
            return Some(red_seed);
        }
        (Some(red_seed), Some(blue_seed))
    } else {
        (
            resolve_series(ctx, round * 2, group * 2 - 1),
            resolve_series(ctx, round * 2, group * 2),
        )
    };

    let mut indices: Vec<usize> = (0..ctx.matches.len())
        .filter(|i| {
            let m = &ctx.matches[*i].inner;
            m.playoff_round == round && m.playoff_group == group
        })
        .collect();
    indices.sort_by_key(|i| ctx.matches[*i].inner.playoff_instance);

    if indices.is_empty() {
        if red.is_some() || blue.is_some() {
            for instance in 1..=3 {
                let m = new_series_match(ctx, round, group, instance, red, blue);
                ctx.matches.push(WorkingMatch {
                    inner: m,
                    is_new: true,
                    dirty: false,
                });
            }
        }
        return None;
    }

    backfill(ctx, &indices, red, blue);

    let mut red_wins = 0;
    let mut blue_wins = 0;
    let mut complete = 0;
    let mut tied: Vec<usize> = Vec::new();
    for i in &indices {
        match ctx.matches[*i].inner.status {
            MatchStatus::RedWon => red_wins += 1,
            MatchStatus::BlueWon => blue_wins += 1,
            MatchStatus::Tied => tied.push(*i),
            MatchStatus::Scheduled => continue,
        }
        complete += 1;
    }

    let first = &ctx.matches[indices[0]].inner;
    let winner = if red_wins >= 2 {
        Some(first.playoff_red_alliance)
    } else if blue_wins >= 2 {
        Some(first.playoff_blue_alliance)
    } else {
        None
    };

    if winner.is_some() {
        // The series is decided; drop the instances that will never play.
        let mut deleted = Vec::new();
        ctx.matches.retain(|w| {
            let m = &w.inner;
            let surplus =
                m.playoff_round == round && m.playoff_group == group && !m.is_complete();
            if surplus && !w.is_new {
                deleted.push(m.id);
            }
            !surplus
        });
        ctx.deleted_ids.extend(deleted);
    } else if complete == indices.len() && !tied.is_empty() {
        // Every instance has played and nobody has two wins yet; rematch each
        // tie under the next instance numbers.
        let mut next_instance = indices
            .iter()
            .map(|i| ctx.matches[*i].inner.playoff_instance)
            .max()
            .unwrap_or(0)
            + 1;
        for i in tied {
            let mut rematch = ctx.matches[i].inner.clone();
            rematch.id = 0;
            rematch.playoff_instance = next_instance;
            rematch.short_name = series_name(round, group, next_instance);
            rematch.status = MatchStatus::Scheduled;
            rematch.started_at = None;
            next_instance += 1;
            ctx.matches.push(WorkingMatch {
                inner: rematch,
                is_new: true,
                dirty: false,
            });
        }
    }

    winner
}

fn new_series_match<R: Rng>(
    ctx: &mut BracketContext<'_, R>,
    round: u32,
    group: u32,
    instance: u32,
    red: Option<u32>,
    blue: Option<u32>,
) -> Match {
    let mut m = Match::new(MatchType::Playoff, 0, series_name(round, group, instance));
    m.playoff_round = round;
    m.playoff_group = group;
    m.playoff_instance = instance;
    if let Some(seed) = red {
        let lineup = shuffled_lineup(ctx, seed);
        [m.red1, m.red2, m.red3] = lineup;
        m.playoff_red_alliance = seed;
    }
    if let Some(seed) = blue {
        let lineup = shuffled_lineup(ctx, seed);
        [m.blue1, m.blue2, m.blue3] = lineup;
        m.playoff_blue_alliance = seed;
    }
    m
}

fn backfill<R: Rng>(
    ctx: &mut BracketContext<'_, R>,
    indices: &[usize],
    red: Option<u32>,
    blue: Option<u32>,
) {
    for i in indices {
        if let Some(seed) = red {
            if ctx.matches[*i].inner.playoff_red_alliance == 0 {
                let lineup = shuffled_lineup(ctx, seed);
                let working = &mut ctx.matches[*i];
                [working.inner.red1, working.inner.red2, working.inner.red3] = lineup;
                working.inner.playoff_red_alliance = seed;
                working.dirty = true;
            }
        }
        if let Some(seed) = blue {
            if ctx.matches[*i].inner.playoff_blue_alliance == 0 {
                let lineup = shuffled_lineup(ctx, seed);
                let working = &mut ctx.matches[*i];
                [working.inner.blue1, working.inner.blue2, working.inner.blue3] = lineup;
                working.inner.playoff_blue_alliance = seed;
                working.dirty = true;
            }
        }
    }
}

fn shuffled_lineup<R: Rng>(ctx: &mut BracketContext<'_, R>, seed: u32) -> [u32; 3] {
    let mut lineup = ctx.alliances[(seed - 1) as usize]
        .lineup()
        .unwrap_or([0; 3]);
    lineup.shuffle(ctx.rng);
    lineup
}

/// Re-number every playoff match and put the not-yet-played ones on the clock.
fn schedule<R: Rng>(ctx: &mut BracketContext<'_, R>, start_time: OffsetDateTime, spacing: Duration) {
    ctx.matches.sort_by_key(|w| {
        (
            Reverse(w.inner.playoff_round),
            w.inner.playoff_instance,
            w.inner.playoff_group,
        )
    });
    let mut slot = 0u32;
    for (position, working) in ctx.matches.iter_mut().enumerate() {
        let order = position as u32 + 1;
        if working.inner.type_order != order {
            working.inner.type_order = order;
            working.dirty = true;
        }
        if !working.inner.is_complete() {
            let at = start_time + spacing * slot;
            slot += 1;
            if working.inner.scheduled_at != at {
                working.inner.scheduled_at = at;
                working.dirty = true;
            }
        }
    }
}
