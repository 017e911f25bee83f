//! Fake-data generators for dynamic variables.
//!
//! A dynamic variable's value may embed `{{faker.X}}` tokens which are
//! re-evaluated on every resolution, so each user of a multi-run gets
//! fresh data. Generators are backed by the `fake` crate where one
//! exists, with `uuid` / `rand` / `chrono` covering the rest.

use chrono::{Duration, Utc};
use fake::Fake;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::Word;
use fake::faker::name::en::{FirstName, LastName, Name};
use rand::Rng;

use crate::error::ExpressionError;

/// Evaluate a faker token (the part after `faker.`), e.g. `email` or
/// `number(1,100)`.
pub fn generate(token: &str) -> Result<String, ExpressionError> {
    let (name, args) = split_args(token);
    match name {
        "email" => Ok(SafeEmail().fake()),
        "name" => Ok(Name().fake()),
        "first_name" => Ok(FirstName().fake()),
        "last_name" => Ok(LastName().fake()),
        "username" => Ok(Username().fake()),
        "word" => Ok(Word().fake()),
        "password" => Ok(fake::faker::internet::en::Password(12..20).fake()),
        "uuid" => Ok(uuid::Uuid::new_v4().to_string()),
        "number" => {
            let (min, max) = parse_range(args, token)?;
            Ok(rand::thread_rng().gen_range(min..=max).to_string())
        }
        "date" => {
            let days_back = rand::thread_rng().gen_range(0..365);
            let date = Utc::now() - Duration::days(days_back);
            Ok(date.format("%Y-%m-%d").to_string())
        }
        _ => Err(ExpressionError::UnknownFaker(token.to_string())),
    }
}

/// Split `name(a,b)` into `("name", Some("a,b"))`.
fn split_args(token: &str) -> (&str, Option<&str>) {
    match (token.find('('), token.ends_with(')')) {
        (Some(open), true) => (&token[..open], Some(&token[open + 1..token.len() - 1])),
        _ => (token, None),
    }
}

fn parse_range(args: Option<&str>, token: &str) -> Result<(i64, i64), ExpressionError> {
    let Some(args) = args else {
        return Ok((0, 9999));
    };
    let parse = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| ExpressionError::UnknownFaker(token.to_string()))
    };
    match args.split_once(',') {
        Some((min, max)) => {
            let (min, max) = (parse(min)?, parse(max)?);
            if min > max {
                return Err(ExpressionError::UnknownFaker(token.to_string()));
            }
            Ok((min, max))
        }
        None => Ok((0, parse(args)?)),
    }
}
