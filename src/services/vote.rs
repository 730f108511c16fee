use crate::{
    error::{AppError, AppResult},
    models::{
        vote::{self, TargetKind, Votable},
        Vote,
    },
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QuerySelect, TransactionTrait,
};
use std::collections::HashMap;

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Up,
    Down,
}

impl Polarity {
    pub fn value(self) -> i16 {
        match self {
            Polarity::Up => 1,
            Polarity::Down => -1,
        }
    }

    fn from_stored(value: i16) -> AppResult<Self> {
        Self::try_from(value).map_err(|_| {
            AppError::Internal(anyhow::anyhow!("stored vote has invalid value {value}"))
        })
    }
}

impl TryFrom<i16> for Polarity {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Polarity::Up),
            -1 => Ok(Polarity::Down),
            _ => Err(invalid_vote_value()),
        }
    }
}

fn invalid_vote_value() -> AppError {
    AppError::Validation("Invalid vote value".to_string())
}

/// What a cast did to the voter's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// No prior vote; one was created.
    Recorded,
    /// Prior vote had the opposite polarity and was flipped.
    Changed,
    /// Prior vote had the same polarity and was retracted.
    Removed,
}

impl VoteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            VoteOutcome::Recorded => "Vote recorded",
            VoteOutcome::Changed => "Vote updated",
            VoteOutcome::Removed => "Vote removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePlan {
    pub outcome: VoteOutcome,
    /// Voter's polarity once the plan is applied; `None` after a retraction.
    pub resulting: Option<Polarity>,
    /// Relative change to apply to the target's counter.
    pub counter_delta: i32,
}

/// Decide the toggle transition for a voter who currently holds `existing`
/// and submits `requested`.
pub fn plan_vote(existing: Option<Polarity>, requested: Polarity) -> VotePlan {
    let new = i32::from(requested.value());
    match existing {
        None => VotePlan {
            outcome: VoteOutcome::Recorded,
            resulting: Some(requested),
            counter_delta: new,
        },
        Some(old) if old == requested => VotePlan {
            outcome: VoteOutcome::Removed,
            resulting: None,
            counter_delta: -new,
        },
        Some(old) => VotePlan {
            outcome: VoteOutcome::Changed,
            resulting: Some(requested),
            counter_delta: new - i32::from(old.value()),
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CastVote {
    pub outcome: VoteOutcome,
    pub target_kind: TargetKind,
    pub target_id: i32,
    /// Voter's polarity after the call, 0 when the vote was removed.
    pub value: i16,
    /// Target's counter after the call.
    pub upvotes_count: i32,
}

pub struct VoteService {
    db: DatabaseConnection,
}

impl VoteService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Apply toggle semantics for `voter_id` on target `target_id` of kind `T`.
    ///
    /// `value` is the submitted polarity, `None` when it was not an integer.
    /// A missing target is reported before a bad value. The vote row change and
    /// the counter increment commit together or not at all. The target row is
    /// locked first so concurrent votes on the same target serialize.
    pub async fn cast_vote<T: Votable>(
        &self,
        voter_id: i32,
        target_id: i32,
        value: Option<i16>,
    ) -> AppResult<CastVote> {
        let txn = self.db.begin().await?;

        T::find()
            .filter(T::id_column().eq(target_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let requested = value
            .ok_or_else(invalid_vote_value)
            .and_then(Polarity::try_from)?;

        let existing = Vote::find()
            .filter(vote::Column::UserId.eq(voter_id))
            .filter(T::vote_column().eq(target_id))
            .one(&txn)
            .await?;

        let existing_polarity = existing
            .as_ref()
            .map(|v| Polarity::from_stored(v.value))
            .transpose()?;
        let plan = plan_vote(existing_polarity, requested);

        match (plan.outcome, existing) {
            (VoteOutcome::Recorded, _) => {
                self.insert_vote::<T>(&txn, voter_id, target_id, requested)
                    .await?;
            }
            (VoteOutcome::Changed, Some(row)) => {
                let mut active: vote::ActiveModel = row.into();
                active.value = sea_orm::ActiveValue::Set(requested.value());
                active.update(&txn).await?;
            }
            (VoteOutcome::Removed, Some(row)) => {
                Vote::delete_by_id(row.id).exec(&txn).await?;
            }
            (outcome, None) => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "vote outcome {outcome:?} without an existing vote"
                )));
            }
        }

        let counter = T::counter_column();
        let updated = T::update_many()
            .col_expr(counter, Expr::col(counter).add(plan.counter_delta))
            .filter(T::id_column().eq(target_id))
            .exec_with_returning(&txn)
            .await?;
        let upvotes_count = updated.first().map(T::counter).ok_or(AppError::NotFound)?;

        txn.commit().await?;

        tracing::debug!(
            voter_id,
            kind = T::KIND.as_str(),
            target_id,
            delta = plan.counter_delta,
            outcome = ?plan.outcome,
            "vote applied"
        );

        Ok(CastVote {
            outcome: plan.outcome,
            target_kind: T::KIND,
            target_id,
            value: plan.resulting.map_or(0, Polarity::value),
            upvotes_count,
        })
    }

    /// Current polarity of `voter_id` on each of `target_ids` they have voted
    /// on. Anonymous viewers get an empty map.
    pub async fn viewer_votes<T: Votable>(
        &self,
        voter_id: Option<i32>,
        target_ids: &[i32],
    ) -> AppResult<HashMap<i32, i16>> {
        let Some(voter_id) = voter_id else {
            return Ok(HashMap::new());
        };
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Option<i32>, i16)> = Vote::find()
            .select_only()
            .column(T::vote_column())
            .column(vote::Column::Value)
            .filter(vote::Column::UserId.eq(voter_id))
            .filter(T::vote_column().is_in(target_ids.iter().copied()))
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(target_id, value)| Some((target_id?, value)))
            .collect())
    }

    async fn insert_vote<T: Votable>(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        voter_id: i32,
        target_id: i32,
        polarity: Polarity,
    ) -> AppResult<()> {
        let mut new_vote = vote::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(voter_id),
            value: sea_orm::ActiveValue::Set(polarity.value()),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };
        new_vote.set(T::vote_column(), Some(target_id).into());
        new_vote.insert(txn).await?;
        Ok(())
    }
}
