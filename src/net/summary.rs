// Summary line grammar
//
// <state> <recv-q> <send-q> <local-addr> <peer-addr> [users:((...))]
//
// The users group may itself contain whitespace, so the line is split into
// at most six fields and the sixth keeps the remainder of the line.

use super::error::ParseError;
use super::fields::parse_user_list;
use super::ConnectionSummary;

/// Maximum number of whitespace-separated fields in a summary line
const MAX_FIELDS: usize = 6;

const USERS_PREFIX: &str = "users:((";
const USERS_SUFFIX: &str = "))";

/// Parse one summary line into a [`ConnectionSummary`]
pub fn parse_summary_line(line: &str) -> Result<ConnectionSummary, ParseError> {
    let parts = split_bounded(line, MAX_FIELDS);
    if !(5..=MAX_FIELDS).contains(&parts.len()) {
        return Err(ParseError::SummaryFieldCount {
            fields: parts.len(),
            line: line.to_string(),
        });
    }

    let recv_queue = parse_queue("recv", parts[1])?;
    let send_queue = parse_queue("send", parts[2])?;

    let owners = match parts.get(5) {
        Some(group) => {
            let inner = group
                .trim_end()
                .strip_prefix(USERS_PREFIX)
                .and_then(|rest| rest.strip_suffix(USERS_SUFFIX))
                .ok_or_else(|| ParseError::UsersEnvelope {
                    group: group.to_string(),
                })?;
            parse_user_list(inner)?
        }
        None => Vec::new(),
    };

    Ok(ConnectionSummary {
        state: parts[0].to_string(),
        recv_queue,
        send_queue,
        local_addr: parts[3].to_string(),
        peer_addr: parts[4].to_string(),
        owners,
    })
}

fn parse_queue(queue: &'static str, value: &str) -> Result<u64, ParseError> {
    value.parse().map_err(|source| ParseError::QueueDepth {
        queue,
        value: value.to_string(),
        source,
    })
}

/// Split on runs of whitespace into at most `max` fields
///
/// Leading whitespace is ignored. The last field holds the unsplit
/// remainder of the line.
fn split_bounded(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim_start();

    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }

    fields
}
