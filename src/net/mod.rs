// Socket snapshot model and parsing
// Turns paired `ss -tip` lines into merged Connection records

pub mod detail;
pub mod error;
pub mod fields;
pub mod summary;

pub use detail::{parse_detail_line, ConnectionDetail};
pub use error::{ParseError, SnapshotError};
pub use summary::parse_summary_line;

use serde::Serialize;
use tracing::{debug, warn};

use crate::app::config::{OwnerIdentity, SnapshotConfig, MAX_OWNERS};
use fields::{parse_address, parse_bandwidth, parse_rtt};

/// A process holding one end of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOwner {
    pub name: String,
    pub pid: i32,
    pub fd: i32,
}

impl ProcessOwner {
    /// Graph node identity for this owner
    pub fn identity(&self, identity: OwnerIdentity) -> String {
        match identity {
            OwnerIdentity::Name => self.name.clone(),
            OwnerIdentity::Pid => self.pid.to_string(),
        }
    }
}

/// Host and port of an endpoint, split at the last colon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointAddress {
    pub host: String,
    pub port: String,
}

/// Fields of a summary line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSummary {
    pub state: String,
    #[serde(rename = "recv_q")]
    pub recv_queue: u64,
    #[serde(rename = "send_q")]
    pub send_queue: u64,
    pub local_addr: String,
    pub peer_addr: String,
    #[serde(rename = "users")]
    pub owners: Vec<ProcessOwner>,
}

/// One summary/detail pair merged with its derived fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    #[serde(flatten)]
    pub summary: ConnectionSummary,
    #[serde(flatten)]
    pub detail: ConnectionDetail,
    pub rtt_avg: f64,
    #[serde(rename = "rtt_sd")]
    pub rtt_std_dev: f64,
    /// Send rate in bits per second
    pub send_bandwidth: f64,
    /// Identity of `owners[0]`
    #[serde(rename = "local_pid")]
    pub local_owner: Option<String>,
    /// Identity of `owners[1]`
    #[serde(rename = "peer_pid")]
    pub peer_owner: Option<String>,
    pub local_addr_parsed: EndpointAddress,
    pub peer_addr_parsed: EndpointAddress,
}

impl Connection {
    /// Merge a summary line and its detail line into one record
    pub fn merge(
        summary: ConnectionSummary,
        detail: ConnectionDetail,
        identity: OwnerIdentity,
    ) -> Result<Self, ParseError> {
        if summary.owners.len() > MAX_OWNERS {
            return Err(ParseError::TooManyOwners {
                count: summary.owners.len(),
            });
        }

        let local_owner = summary.owners.first().map(|o| o.identity(identity));
        let peer_owner = summary.owners.get(1).map(|o| o.identity(identity));

        let local_addr_parsed = parse_address(&summary.local_addr)?;
        let peer_addr_parsed = parse_address(&summary.peer_addr)?;
        let rtt = parse_rtt(&detail.rtt)?;
        let send_bandwidth = parse_bandwidth(&detail.send)?;

        Ok(Self {
            summary,
            detail,
            rtt_avg: rtt.avg,
            rtt_std_dev: rtt.std_dev,
            send_bandwidth,
            local_owner,
            peer_owner,
            local_addr_parsed,
            peer_addr_parsed,
        })
    }

    /// Owner of the local end, if ss could see it
    pub fn local_process(&self) -> Option<&ProcessOwner> {
        self.summary.owners.first()
    }
}

/// Parse a whole snapshot, one connection per line pair
///
/// Line 2k is a summary line and line 2k+1 its detail line. A trailing
/// unpaired line is dropped with a warning. Any malformed pair aborts the
/// whole parse.
pub fn parse_snapshot(
    input: &str,
    config: &SnapshotConfig,
) -> Result<Vec<Connection>, SnapshotError> {
    let mut lines: Vec<&str> = input.lines().collect();
    let mut first_line_no = 1;

    if config.skip_header && lines.first().is_some_and(|l| is_header(l)) {
        debug!("parse_snapshot: Skipping column header");
        lines.remove(0);
        first_line_no += 1;
    }

    let pairs = lines.chunks_exact(2);
    if let [unpaired] = pairs.remainder() {
        warn!(
            line_no = first_line_no + lines.len() - 1,
            line = %unpaired,
            "Odd number of lines, dropping final unpaired line"
        );
    }

    let connections = pairs
        .enumerate()
        .map(|(i, pair)| {
            let line_no = first_line_no + 2 * i;
            parse_pair(pair[0], pair[1], config.identity)
                .map_err(|source| SnapshotError { line_no, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("parse_snapshot: Parsed {} connections", connections.len());
    Ok(connections)
}

fn parse_pair(
    summary_line: &str,
    detail_line: &str,
    identity: OwnerIdentity,
) -> Result<Connection, ParseError> {
    let summary = parse_summary_line(summary_line)?;
    let detail = parse_detail_line(detail_line)?;
    Connection::merge(summary, detail, identity)
}

/// Column header printed by ss above the first record
fn is_header(line: &str) -> bool {
    line.split_whitespace().next() == Some("State")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::net::error::FormatError;
    use proptest::prelude::*;

    pub(crate) const DETAIL: &str = "\t cubic wscale:7,7 rto:204 rtt:10.0/2.0 mss:1448 pmtu:1500 \
        rcvmss:536 advmss:1448 cwnd:10 send 1.5Mbps rcv_space:14480 rcv_ssthresh:64088 \
        minrtt:9.5";

    fn owner(name: &str, pid: i32, fd: i32) -> ProcessOwner {
        ProcessOwner {
            name: name.to_string(),
            pid,
            fd,
        }
    }

    fn summary(owners: Vec<ProcessOwner>) -> ConnectionSummary {
        ConnectionSummary {
            state: "ESTAB".to_string(),
            recv_queue: 0,
            send_queue: 0,
            local_addr: "10.0.0.1:5000".to_string(),
            peer_addr: "[2001:db8::1]:443".to_string(),
            owners,
        }
    }

    #[test]
    fn test_merge_derives_fields() {
        let detail = parse_detail_line(DETAIL).unwrap();
        let conn = Connection::merge(
            summary(vec![owner("procA", 1, 3), owner("procB", 2, 4)]),
            detail,
            OwnerIdentity::Name,
        )
        .unwrap();

        assert_eq!(conn.rtt_avg, 10.0);
        assert_eq!(conn.rtt_std_dev, 2.0);
        assert_eq!(conn.send_bandwidth, 1_500_000.0);
        assert_eq!(conn.local_owner.as_deref(), Some("procA"));
        assert_eq!(conn.peer_owner.as_deref(), Some("procB"));
        assert_eq!(conn.local_addr_parsed.port, "5000");
        assert_eq!(conn.peer_addr_parsed.host, "[2001:db8::1]");
        assert_eq!(conn.local_process().map(|o| o.pid), Some(1));
    }

    #[test]
    fn test_merge_pid_identity() {
        let detail = parse_detail_line(DETAIL).unwrap();
        let conn = Connection::merge(
            summary(vec![owner("procA", 1, 3)]),
            detail,
            OwnerIdentity::Pid,
        )
        .unwrap();
        assert_eq!(conn.local_owner.as_deref(), Some("1"));
        assert_eq!(conn.peer_owner, None);
    }

    #[test]
    fn test_merge_rejects_three_owners() {
        let detail = parse_detail_line(DETAIL).unwrap();
        let err = Connection::merge(
            summary(vec![owner("a", 1, 1), owner("b", 2, 2), owner("c", 3, 3)]),
            detail,
            OwnerIdentity::Name,
        )
        .unwrap_err();
        assert_eq!(err, ParseError::TooManyOwners { count: 3 });
    }

    #[test]
    fn test_merge_rejects_bad_derived_tokens() {
        let mut detail = parse_detail_line(DETAIL).unwrap();
        detail.send = "1.5Mbit".to_string();
        let err = Connection::merge(summary(vec![]), detail, OwnerIdentity::Name).unwrap_err();
        assert!(matches!(err, ParseError::Format(FormatError::Bandwidth { .. })));

        let mut s = summary(vec![]);
        s.peer_addr = "*".to_string();
        let detail = parse_detail_line(DETAIL).unwrap();
        let err = Connection::merge(s, detail, OwnerIdentity::Name).unwrap_err();
        assert!(matches!(err, ParseError::Format(FormatError::Address { .. })));
    }

    #[test]
    fn test_parse_snapshot_pairs_lines() {
        let input = format!(
            "ESTAB 0 0 10.0.0.1:22 10.0.0.9:51234 users:((\"sshd\",pid=10,fd=3))\n{DETAIL}\n\
             ESTAB 0 0 10.0.0.1:80 10.0.0.9:40000\n{DETAIL}\n"
        );
        let conns = parse_snapshot(&input, &SnapshotConfig::default()).unwrap();
        assert_eq!(conns.len(), 2);
        assert_eq!(conns[0].local_owner.as_deref(), Some("sshd"));
        assert_eq!(conns[1].local_owner, None);
        assert_eq!(conns[1].summary.local_addr, "10.0.0.1:80");
    }

    #[test]
    fn test_parse_snapshot_drops_unpaired_line() {
        let input = format!("ESTAB 0 0 10.0.0.1:22 10.0.0.9:1\n{DETAIL}\nESTAB 0 0 a:1 b:2\n");
        let conns = parse_snapshot(&input, &SnapshotConfig::default()).unwrap();
        assert_eq!(conns.len(), 1);
    }

    #[test]
    fn test_parse_snapshot_reports_line_number() {
        let input = format!(
            "ESTAB 0 0 10.0.0.1:22 10.0.0.9:1\n{DETAIL}\nESTAB 0 0 10.0.0.1:23 10.0.0.9:2\nnot a detail line\n"
        );
        let err = parse_snapshot(&input, &SnapshotConfig::default()).unwrap_err();
        assert_eq!(err.line_no, 3);
        assert!(matches!(err.source, ParseError::DetailLine { .. }));
        assert_eq!(err.to_string(), "line 3");
    }

    #[test]
    fn test_parse_snapshot_rejects_non_finite_rtt() {
        for rtt in ["NaN/1", "inf/1", "1/inf"] {
            let detail = DETAIL.replace("rtt:10.0/2.0", &format!("rtt:{rtt}"));
            let input = format!(
                "ESTAB 0 0 10.0.0.1:22 10.0.0.9:1 users:((\"sshd\",pid=1,fd=3))\n{detail}\n"
            );
            let err = parse_snapshot(&input, &SnapshotConfig::default()).unwrap_err();
            assert_eq!(err.line_no, 1);
            assert_eq!(
                err.source,
                ParseError::Format(FormatError::Rtt {
                    token: rtt.to_string()
                })
            );
        }
    }

    #[test]
    fn test_parse_snapshot_skip_header() {
        let input = format!(
            "State Recv-Q Send-Q Local Address:Port Peer Address:Port Process\n\
             ESTAB 0 0 10.0.0.1:22 10.0.0.9:1\n{DETAIL}\n"
        );
        let config = SnapshotConfig {
            skip_header: true,
            ..SnapshotConfig::default()
        };
        let conns = parse_snapshot(&input, &config).unwrap();
        assert_eq!(conns.len(), 1);

        // Without skipping, the header is parsed as a summary line and fails
        assert!(parse_snapshot(&input, &SnapshotConfig::default()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Merging lines rendered from known values recovers those values
        #[test]
        fn prop_merge_recovers_rendered_values(
            avg in 0.001f64..10_000.0,
            std_dev in 0.0f64..10_000.0,
            kbps in 1u32..1_000_000,
            recv_q in 0u64..100_000,
            send_q in 0u64..100_000,
            port in 1u16..u16::MAX,
        ) {
            let summary_line = format!(
                "ESTAB {recv_q} {send_q} 192.168.0.2:{port} 192.168.0.3:443 users:((\"p\",pid=5,fd=6))"
            );
            let detail_line = format!(
                "cubic wscale:7,7 rto:204 rtt:{avg}/{std_dev} mss:1448 pmtu:1500 rcvmss:536 \
                 advmss:1448 cwnd:10 send {kbps}kbps rcv_space:1 rcv_ssthresh:2 minrtt:1"
            );
            let conn = parse_pair(&summary_line, &detail_line, OwnerIdentity::Name).unwrap();

            prop_assert_eq!(conn.rtt_avg, avg);
            prop_assert_eq!(conn.rtt_std_dev, std_dev);
            prop_assert_eq!(conn.send_bandwidth, f64::from(kbps) * 1e3);
            prop_assert_eq!(conn.summary.recv_queue, recv_q);
            prop_assert_eq!(conn.summary.send_queue, send_q);
            prop_assert_eq!(conn.local_addr_parsed.port, port.to_string());
        }
    }
}
