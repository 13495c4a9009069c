//! Ranking endpoints mounted at `/`.
//!
//! `GET /` dispatches on its query string, `POST /` stores a snapshot.

use crate::error::{AppError, Result};
use crate::types::{MoneyResponse, RankingQuery, UserSnapshot};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::debug;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_ranking).post(post_snapshot))
}

/// Which read a `GET /` query asks for.
#[derive(Debug, PartialEq, Eq)]
enum RankingRequest<'a> {
    Register(&'a str),
    Money(&'a str),
    Stocks(&'a str),
    Top(u32),
    Mine(&'a str),
}

fn flag(value: &Option<String>, expected: &str) -> bool {
    value.as_deref() == Some(expected)
}

impl<'a> RankingRequest<'a> {
    fn parse(query: &'a RankingQuery) -> Result<Self> {
        let user = query.user_name.as_deref().filter(|u| !u.is_empty());

        if flag(&query.register, "true") {
            return user
                .map(Self::Register)
                .ok_or_else(|| AppError::BadRequest("register requires user_name".to_string()));
        }
        if flag(&query.get_money, "1") {
            return user
                .map(Self::Money)
                .ok_or_else(|| AppError::BadRequest("get_money requires user_name".to_string()));
        }
        if flag(&query.get_stocks, "1") {
            return user
                .map(Self::Stocks)
                .ok_or_else(|| AppError::BadRequest("get_stocks requires user_name".to_string()));
        }
        if let Some(limit) = query.limit.as_deref() {
            return limit
                .trim()
                .parse::<u32>()
                .map(Self::Top)
                .map_err(|_| AppError::BadRequest(format!("invalid limit '{}'", limit)));
        }
        user.map(Self::Mine)
            .ok_or_else(|| AppError::BadRequest("unrecognized query".to_string()))
    }
}

async fn get_ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<Response> {
    let request = RankingRequest::parse(&query)?;
    debug!("GET / {:?}", request);

    let response = match request {
        RankingRequest::Register(user) => Json(state.store.register(user)?).into_response(),
        RankingRequest::Money(user) => Json(MoneyResponse {
            money: state.store.money(user)?,
        })
        .into_response(),
        RankingRequest::Stocks(user) => Json(state.store.stocks(user)?).into_response(),
        RankingRequest::Top(limit) => Json(state.store.top_ranking(limit)?).into_response(),
        RankingRequest::Mine(user) => Json(state.store.my_ranking(user)?).into_response(),
    };
    Ok(response)
}

async fn post_snapshot(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let snapshot: UserSnapshot = serde_json::from_slice(&body)?;
    state.store.upsert_snapshot(&snapshot)?;
    Ok(Json(json!({ "message": "saved" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &str) -> RankingQuery {
        serde_urlencoded::from_str(pairs).unwrap()
    }

    #[test]
    fn test_dispatch() {
        let q = query("user_name=alice&register=true");
        assert_eq!(RankingRequest::parse(&q).unwrap(), RankingRequest::Register("alice"));

        let q = query("user_name=alice&get_money=1");
        assert_eq!(RankingRequest::parse(&q).unwrap(), RankingRequest::Money("alice"));

        let q = query("user_name=alice&get_stocks=1");
        assert_eq!(RankingRequest::parse(&q).unwrap(), RankingRequest::Stocks("alice"));

        let q = query("limit=5");
        assert_eq!(RankingRequest::parse(&q).unwrap(), RankingRequest::Top(5));

        let q = query("user_name=alice");
        assert_eq!(RankingRequest::parse(&q).unwrap(), RankingRequest::Mine("alice"));
    }

    #[test]
    fn test_dispatch_rejects() {
        for bad in ["", "limit=abc", "get_money=1", "register=true", "user_name="] {
            assert!(
                matches!(RankingRequest::parse(&query(bad)), Err(AppError::BadRequest(_))),
                "query '{}' should be rejected",
                bad
            );
        }
    }
}
