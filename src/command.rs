//! Command table
//!
//! An append-only list of `(name, handler)` pairs, searched linearly with an
//! exact, case-sensitive match; the first registration of a name wins.
//! Handlers come in two shapes: ones taking two numeric arguments (fed from
//! a document's `PARAMETERS` list) and ones pulling whitespace-separated
//! tokens themselves (fed from a text line).

use core::fmt;
use core::marker::PhantomData;
use core::str::SplitAsciiWhitespace;

use heapless::Vec;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::codec::Status;

/// Parameters beyond this many make a document malformed.
pub const MAX_PARAMETERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// More commands registered than the table was built for.
    TableFull,
}

/// Something the dispatcher can answer on directly, for input that never
/// reaches a handler.
pub trait Respond {
    fn respond(&mut self, status: Status, text: &str);
}

/// Remaining tokens of a text command line.
pub struct Args<'a> {
    tokens: SplitAsciiWhitespace<'a>,
    commands: &'a [&'static str],
}

impl<'a> Args<'a> {
    fn new(rest: &'a str, commands: &'a [&'static str]) -> Self {
        Self {
            tokens: rest.split_ascii_whitespace(),
            commands,
        }
    }

    /// Names registered in the table this line was dispatched from.
    pub fn commands(&self) -> &'a [&'static str] {
        self.commands
    }
}

impl<'a> Iterator for Args<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.tokens.next()
    }
}

pub enum Handler<C> {
    /// Called with the first two document parameters, zero when absent.
    Fixed(fn(&mut C, u8, u8)),
    /// Called with the rest of a text line.
    Text(fn(&mut C, &mut Args<'_>)),
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Handler<C> {}

/// Called with the unmatched command name, or `""` when there was none.
pub type DefaultHandler<C> = fn(&mut C, &str);

/// Whatever the host put under `COMMAND`. Anything but a string is kept
/// only as the fact that it was not a name.
enum Name<'a> {
    Text(&'a str),
    Other,
}

impl<'de: 'a, 'a> Deserialize<'de> for Name<'a> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde-json-core has no `deserialize_any`; its ignored-any path still
        // hands strings, sequences and maps to the visitor and reports scalars
        // as unit
        deserializer.deserialize_ignored_any(NameVisitor(PhantomData))
    }
}

struct NameVisitor<'a>(PhantomData<&'a ()>);

impl<'de: 'a, 'a> Visitor<'de> for NameVisitor<'a> {
    type Value = Name<'a>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a command name")
    }

    fn visit_borrowed_str<E: de::Error>(self, v: &'de str) -> Result<Name<'a>, E> {
        Ok(Name::Text(v))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Name<'a>, E> {
        Ok(Name::Other)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Name<'a>, E> {
        Ok(Name::Other)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Name<'a>, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Name::Other)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Name<'a>, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(Name::Other)
    }
}

#[derive(Deserialize)]
struct Request<'a> {
    #[serde(rename = "COMMAND", default, borrow)]
    command: Option<Name<'a>>,
    #[serde(rename = "PARAMETERS", default)]
    parameters: Vec<i32, MAX_PARAMETERS>,
}

pub struct CommandTable<C, const N: usize> {
    names: Vec<&'static str, N>,
    handlers: Vec<Handler<C>, N>,
    default: DefaultHandler<C>,
}

impl<C, const N: usize> CommandTable<C, N> {
    pub fn new(default: DefaultHandler<C>) -> Self {
        Self {
            names: Vec::new(),
            handlers: Vec::new(),
            default,
        }
    }

    pub fn register(&mut self, name: &'static str, handler: Handler<C>) -> Result<(), Error> {
        if self.names.is_full() {
            return Err(Error::TableFull);
        }
        let _ = self.names.push(name);
        let _ = self.handlers.push(handler);
        Ok(())
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn lookup(&self, name: &str) -> Option<Handler<C>> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|i| self.handlers[i])
    }

    /// Hand `name` straight to the default handler.
    pub fn dispatch_unrecognized(&self, ctx: &mut C, name: &str) {
        (self.default)(ctx, name)
    }

    /// Run one whitespace-tokenized text line.
    pub fn dispatch_text(&self, ctx: &mut C, line: &str) {
        let line = line.trim_start();
        let Some(name) = line.split_ascii_whitespace().next() else {
            return;
        };
        let rest = &line[name.len()..];
        match self.lookup(name) {
            Some(Handler::Fixed(f)) => f(ctx, 0, 0),
            Some(Handler::Text(f)) => f(ctx, &mut Args::new(rest, &self.names)),
            None => (self.default)(ctx, name),
        }
    }

    /// Run one structured-document line.
    pub fn dispatch_document(&self, ctx: &mut C, line: &[u8])
    where
        C: Respond,
    {
        let request = match serde_json_core::from_slice::<Request<'_>>(line) {
            Ok((request, _)) => request,
            Err(_) => {
                warn!("malformed command document");
                ctx.respond(Status::BadRequest, Status::BadRequest.text());
                return;
            }
        };
        let name = match request.command {
            Some(Name::Text(name)) if !name.is_empty() => name,
            _ => {
                (self.default)(ctx, "");
                return;
            }
        };
        // values are byte-sized on the wire; wider numbers are truncated
        let param = |i: usize| request.parameters.get(i).map_or(0, |v| *v as u8);
        match self.lookup(name) {
            Some(Handler::Fixed(f)) => f(ctx, param(0), param(1)),
            Some(Handler::Text(f)) => f(ctx, &mut Args::new("", &self.names)),
            None => (self.default)(ctx, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::{String, ToString};
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct Recorder {
        calls: StdVec<String>,
    }

    impl Respond for Recorder {
        fn respond(&mut self, status: Status, text: &str) {
            self.calls.push(format!("respond {} {}", status.code(), text));
        }
    }

    fn unrecognized(r: &mut Recorder, name: &str) {
        r.calls.push(format!("default {name:?}"));
    }

    fn first(r: &mut Recorder, a: u8, b: u8) {
        r.calls.push(format!("first {a} {b}"));
    }

    fn second(r: &mut Recorder, _a: u8, _b: u8) {
        r.calls.push("second".to_string());
    }

    fn words(r: &mut Recorder, args: &mut Args<'_>) {
        let collected: StdVec<&str> = args.collect();
        r.calls.push(format!("words {}", collected.join(",")));
    }

    fn table() -> CommandTable<Recorder, 4> {
        let mut table = CommandTable::new(unrecognized as DefaultHandler<Recorder>);
        table.register("rdatac", Handler::Fixed(first)).unwrap();
        table.register("rdatac", Handler::Fixed(second)).unwrap();
        table.register("wreg", Handler::Text(words)).unwrap();
        table
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let table = table();
        let mut r = Recorder::default();
        table.dispatch_text(&mut r, "RDATAC");
        table.dispatch_text(&mut r, "rdatac");
        table.dispatch_text(&mut r, "rdata");
        assert_eq!(r.calls, ["default \"RDATAC\"", "first 0 0", "default \"rdata\""]);
    }

    #[test]
    fn first_registration_wins() {
        let table = table();
        let mut r = Recorder::default();
        table.dispatch_document(&mut r, br#"{"COMMAND":"rdatac","PARAMETERS":[1,2]}"#);
        assert_eq!(r.calls, ["first 1 2"]);
    }

    #[test]
    fn text_handlers_pull_their_own_tokens() {
        let table = table();
        let mut r = Recorder::default();
        table.dispatch_text(&mut r, "  wreg   05\t68 ");
        table.dispatch_text(&mut r, "");
        assert_eq!(r.calls, ["words 05,68"]);
    }

    #[test]
    fn documents_feed_fixed_parameters() {
        let table = table();
        let mut r = Recorder::default();
        table.dispatch_document(&mut r, br#"{"COMMAND":"rdatac","PARAMETERS":[5,104,7]}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":"rdatac","PARAMETERS":[3]}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":"rdatac"}"#);
        assert_eq!(r.calls, ["first 5 104", "first 3 0", "first 0 0"]);
    }

    #[test]
    fn document_errors_are_classified() {
        let table = table();
        let mut r = Recorder::default();
        table.dispatch_document(&mut r, b"{not json");
        table.dispatch_document(&mut r, br#"{"PARAMETERS":[1]}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":""}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":"bogus"}"#);
        assert_eq!(
            r.calls,
            [
                "respond 400 Bad request",
                "default \"\"",
                "default \"\"",
                "default \"bogus\"",
            ]
        );
    }

    #[test]
    fn non_string_commands_are_unrecognized() {
        let table = table();
        let mut r = Recorder::default();
        table.dispatch_document(&mut r, br#"{"COMMAND":5,"PARAMETERS":[1]}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":true}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":["rdatac",{"x":1}]}"#);
        table.dispatch_document(&mut r, br#"{"COMMAND":null}"#);
        assert_eq!(r.calls, ["default \"\""; 4]);
    }

    #[test]
    fn registration_beyond_capacity_fails() {
        let mut table = table();
        table.register("one", Handler::Fixed(first)).unwrap();
        assert_eq!(table.register("two", Handler::Fixed(first)), Err(Error::TableFull));
        assert_eq!(table.names().len(), 4);
    }
}
