// Detail line grammar
//
// The kernel TCP info line is an ordered sequence of tokens. Every field
// has a fixed position; optional fields may be absent at their position
// but never appear elsewhere. The parser walks the tokens once with a
// cursor and tries each optional field only at its own position.

use serde::Serialize;
use std::iter::Peekable;
use std::str::SplitWhitespace;

use super::error::ParseError;

/// Socket option flags that ss may print before the congestion algorithm
const LEADING_FLAGS: [&str; 5] = ["ts", "sack", "ecn", "ecnseen", "fastopen"];

/// Raw TCP metrics from one detail line
///
/// Values are kept as the text ss printed. Optional fields that were not
/// present are `None` and serialize as `null`, so every key is always
/// present in the output.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConnectionDetail {
    pub flags: Vec<String>,
    pub congestion_algorithm: String,
    pub wscale: String,
    pub rto: String,
    pub rtt: String,
    pub ato: Option<String>,
    pub mss: String,
    pub pmtu: String,
    pub rcvmss: String,
    pub advmss: String,
    pub cwnd: String,
    pub ssthresh: Option<String>,
    pub bytes_sent: Option<String>,
    pub bytes_acked: Option<String>,
    pub bytes_received: Option<String>,
    pub segs_out: Option<String>,
    pub segs_in: Option<String>,
    pub data_segs_out: Option<String>,
    pub data_segs_in: Option<String>,
    pub send: String,
    pub lastsnd: Option<String>,
    pub lastrcv: Option<String>,
    pub lastack: Option<String>,
    pub pacing_rate: Option<String>,
    pub delivery_rate: Option<String>,
    pub delivered: Option<String>,
    pub app_limited: bool,
    pub busy: Option<String>,
    pub rwnd_limited: Option<String>,
    pub sndbuf_limited: Option<String>,
    pub unacked: Option<String>,
    pub retrans: Option<String>,
    pub lost: Option<String>,
    pub rcv_rtt: Option<String>,
    pub rcv_space: String,
    pub rcv_ssthresh: String,
    pub notsent: Option<String>,
    pub minrtt: String,
    pub snd_wnd: Option<String>,
    pub rcv_wnd: Option<String>,
}

/// Parse the detail line that follows a summary line
pub fn parse_detail_line(line: &str) -> Result<ConnectionDetail, ParseError> {
    let mut c = Cursor::new(line);

    let mut flags = Vec::new();
    while let Some(flag) = LEADING_FLAGS.iter().find(|f| c.flag(f)) {
        flags.push(flag.to_string());
    }

    let congestion_algorithm = c.bare_word("congestion algorithm")?;
    let wscale = c.expect_keyed("wscale")?;
    let rto = c.expect_keyed("rto")?;
    let rtt = c.expect_keyed("rtt")?;
    let ato = c.keyed("ato");
    let mss = c.expect_keyed("mss")?;
    let pmtu = c.expect_keyed("pmtu")?;
    let rcvmss = c.expect_keyed("rcvmss")?;
    let advmss = c.expect_keyed("advmss")?;
    let cwnd = c.expect_keyed("cwnd")?;
    let ssthresh = c.keyed("ssthresh");
    let bytes_sent = c.keyed("bytes_sent");
    let bytes_acked = c.keyed("bytes_acked");
    let bytes_received = c.keyed("bytes_received");
    let segs_out = c.keyed("segs_out");
    let segs_in = c.keyed("segs_in");
    let data_segs_out = c.keyed("data_segs_out");
    let data_segs_in = c.keyed("data_segs_in");
    let send = c.expect_spaced("send")?;
    let lastsnd = c.keyed("lastsnd");
    let lastrcv = c.keyed("lastrcv");
    let lastack = c.keyed("lastack");
    let pacing_rate = c.spaced("pacing_rate")?;
    let delivery_rate = c.spaced("delivery_rate")?;
    let delivered = c.keyed("delivered");
    let app_limited = c.flag("app_limited");
    let busy = c.keyed("busy");
    let rwnd_limited = c.keyed("rwnd_limited");
    let sndbuf_limited = c.keyed("sndbuf_limited");
    let unacked = c.keyed("unacked");
    let retrans = c.keyed("retrans");
    let lost = c.keyed("lost");
    let rcv_rtt = c.keyed("rcv_rtt");
    let rcv_space = c.expect_keyed("rcv_space")?;
    let rcv_ssthresh = c.expect_keyed("rcv_ssthresh")?;
    let notsent = c.keyed("notsent");
    let minrtt = c.expect_keyed("minrtt")?;
    let snd_wnd = c.keyed("snd_wnd");
    let rcv_wnd = c.keyed("rcv_wnd");
    c.finish()?;

    Ok(ConnectionDetail {
        flags,
        congestion_algorithm,
        wscale,
        rto,
        rtt,
        ato,
        mss,
        pmtu,
        rcvmss,
        advmss,
        cwnd,
        ssthresh,
        bytes_sent,
        bytes_acked,
        bytes_received,
        segs_out,
        segs_in,
        data_segs_out,
        data_segs_in,
        send,
        lastsnd,
        lastrcv,
        lastack,
        pacing_rate,
        delivery_rate,
        delivered,
        app_limited,
        busy,
        rwnd_limited,
        sndbuf_limited,
        unacked,
        retrans,
        lost,
        rcv_rtt,
        rcv_space,
        rcv_ssthresh,
        notsent,
        minrtt,
        snd_wnd,
        rcv_wnd,
    })
}

/// Single forward pass over the tokens of one detail line
struct Cursor<'a> {
    line: &'a str,
    tokens: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            tokens: line.split_whitespace().peekable(),
        }
    }

    /// Consume `key:value` if it is the next token
    fn keyed(&mut self, key: &str) -> Option<String> {
        let value = self
            .tokens
            .peek()
            .and_then(|tok| tok.strip_prefix(key))
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|value| !value.is_empty())?
            .to_string();
        self.tokens.next();
        Some(value)
    }

    fn expect_keyed(&mut self, key: &str) -> Result<String, ParseError> {
        self.keyed(key)
            .ok_or_else(|| self.mismatch(format!("{key}:<value>")))
    }

    /// Consume `key <value>` if `key` is the next token
    fn spaced(&mut self, key: &str) -> Result<Option<String>, ParseError> {
        if !self.flag(key) {
            return Ok(None);
        }
        match self.tokens.next() {
            Some(value) => Ok(Some(value.to_string())),
            None => Err(self.mismatch(format!("value after {key}"))),
        }
    }

    fn expect_spaced(&mut self, key: &str) -> Result<String, ParseError> {
        self.spaced(key)?
            .ok_or_else(|| self.mismatch(format!("{key} <value>")))
    }

    /// Consume a bare token equal to `flag`
    fn flag(&mut self, flag: &str) -> bool {
        self.tokens.next_if_eq(&flag).is_some()
    }

    /// Consume a token that is not a `key:value` pair
    fn bare_word(&mut self, what: &str) -> Result<String, ParseError> {
        match self.tokens.next_if(|tok| !tok.contains(':')) {
            Some(word) => Ok(word.to_string()),
            None => Err(self.mismatch(what.to_string())),
        }
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.tokens.peek() {
            None => Ok(()),
            Some(_) => Err(self.mismatch("end of line".to_string())),
        }
    }

    fn mismatch(&mut self, expected: String) -> ParseError {
        let found = match self.tokens.peek() {
            Some(tok) => format!("{tok:?}"),
            None => "end of line".to_string(),
        };
        ParseError::DetailLine {
            expected,
            found,
            line: self.line.trim().to_string(),
        }
    }
}
