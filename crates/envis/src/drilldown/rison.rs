// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Rison, the compact JSON notation Kibana uses for `_g` and `_a` URL state.

use crate::error::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

const NOT_ID_CHARS: &str = " '!:(),*@$";

static ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^-0-9 '!:(),*@$][^ '!:(),*@$]*$").expect("valid regex"));

pub fn decode(input: &str) -> QueryResult<Value> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = parser.value()?;
    if parser.pos != parser.chars.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}
impl Parser {
    fn error(&self, reason: &str) -> QueryError {
        QueryError::Rison {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }
    fn expect(&mut self, want: char) -> QueryResult<()> {
        match self.next() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(&format!("expected '{want}'"))),
        }
    }
    fn value(&mut self) -> QueryResult<Value> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => self.object(),
            Some('\'') => self.string().map(Value::String),
            Some('!') => {
                self.pos += 1;
                match self.next() {
                    Some('t') => Ok(Value::Bool(true)),
                    Some('f') => Ok(Value::Bool(false)),
                    Some('n') => Ok(Value::Null),
                    Some('(') => self.array(),
                    _ => Err(self.error("unknown '!' literal")),
                }
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(_) => self.id().map(Value::String),
        }
    }
    fn object(&mut self) -> QueryResult<Value> {
        self.expect('(')?;
        let mut map = Map::new();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            let key = match self.peek() {
                Some('\'') => self.string()?,
                _ => self.id()?,
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            match self.next() {
                Some(',') => continue,
                Some(')') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or ')' in object")),
            }
        }
    }
    fn array(&mut self) -> QueryResult<Value> {
        let mut items = Vec::new();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.value()?);
            match self.next() {
                Some(',') => continue,
                Some(')') => return Ok(Value::Array(items)),
                _ => return Err(self.error("expected ',' or ')' in array")),
            }
        }
    }
    fn string(&mut self) -> QueryResult<String> {
        self.expect('\'')?;
        let mut out = String::new();
        loop {
            match self.next() {
                None => return Err(self.error("unterminated string")),
                Some('\'') => return Ok(out),
                Some('!') => match self.next() {
                    Some(c @ ('!' | '\'')) => out.push(c),
                    _ => return Err(self.error("invalid string escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }
    fn id(&mut self) -> QueryResult<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if NOT_ID_CHARS.contains(c) {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a value"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
    fn number(&mut self) -> QueryResult<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| QueryError::Rison {
                offset: start,
                reason: format!("invalid number '{text}'"),
            })
    }
}

fn write_string(s: &str, out: &mut String) {
    if ID.is_match(s) {
        out.push_str(s);
        return;
    }
    out.push('\'');
    for c in s.chars() {
        if c == '!' || c == '\'' {
            out.push('!');
        }
        out.push(c);
    }
    out.push('\'');
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("!n"),
        Value::Bool(true) => out.push_str("!t"),
        Value::Bool(false) => out.push_str("!f"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push_str("!(");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(')');
        }
        Value::Object(map) => {
            out.push('(');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_kibana_global_state() {
        let g = decode("(filters:!(),refreshInterval:(pause:!t,value:0),time:(from:now-15m,to:now))")
            .unwrap();
        assert_eq!(
            g,
            json!({
                "filters": [],
                "refreshInterval": { "pause": true, "value": 0 },
                "time": { "from": "now-15m", "to": "now" }
            })
        );
    }

    #[test]
    fn decodes_quoted_strings_and_escapes() {
        assert_eq!(
            decode("(query:'status:\"up\" and it!'s',n:!n,x:-1.5)").unwrap(),
            json!({ "query": "status:\"up\" and it's", "n": null, "x": -1.5 })
        );
        assert_eq!(decode("'a!!b'").unwrap(), json!("a!b"));
    }

    #[test]
    fn encodes_ids_bare_and_others_quoted() {
        let value = json!({
            "barColor": "#32968E",
            "title": "[Drilldown] web/1",
            "excluded": "",
            "n": 3,
            "on": true,
            "list": ["a", "1a"]
        });
        assert_eq!(
            encode(&value),
            "(barColor:#32968E,title:'[Drilldown] web/1',excluded:'',n:3,on:!t,list:!(a,'1a'))"
        );
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn reports_offsets() {
        assert_eq!(
            decode("(a:'open"),
            Err(QueryError::Rison {
                offset: 8,
                reason: "unterminated string".to_string()
            })
        );
        assert!(decode("(a:1))").is_err());
        assert!(decode("!x").is_err());
    }
}
