// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The line-oriented operator console.
//!
//! Each input line is one command; each reply is one line of JSON, either
//! `{"ok":true,...}` or `{"ok":false,"error":"..."}`.

use coreplug_control::Governor;
use coreplug_core::CoreId;
use coreplug_infra::{ManualPowerEvents, SimulatedCpus};
use serde_json::{json, Value};
use std::sync::Arc;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(String),
    Set(String, String),
    Suspend,
    Resume,
    Status,
    Metrics,
    /// Sets a simulated core's busy percentage.
    Load(usize, u32),
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            [] => return Ok(None),
            ["get", key] => Command::Get((*key).to_string()),
            ["set", key, value] => Command::Set((*key).to_string(), (*value).to_string()),
            ["suspend"] => Command::Suspend,
            ["resume"] => Command::Resume,
            ["status"] => Command::Status,
            ["metrics"] => Command::Metrics,
            ["load", core, pct] => {
                let core = core
                    .parse::<usize>()
                    .map_err(|_| format!("bad core index '{core}'"))?;
                let pct = pct
                    .parse::<u32>()
                    .ok()
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| format!("bad percentage '{pct}'"))?;
                Command::Load(core, pct)
            }
            ["help"] => Command::Help,
            ["quit"] | ["exit"] => Command::Quit,
            _ => return Err(format!("unrecognised command '{}'", line.trim())),
        };
        Ok(Some(command))
    }
}

/// What the caller should do after a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Executes commands against a running governor.
pub struct Console {
    governor: Arc<Governor>,
    power: Arc<ManualPowerEvents>,
    simulated: Option<Arc<SimulatedCpus>>,
}

impl Console {
    /// Creates a console. `simulated` enables the `load` command.
    pub fn new(
        governor: Arc<Governor>,
        power: Arc<ManualPowerEvents>,
        simulated: Option<Arc<SimulatedCpus>>,
    ) -> Self {
        Self {
            governor,
            power,
            simulated,
        }
    }

    /// Handles one input line and returns the JSON reply, if any.
    pub fn handle_line(&self, line: &str) -> (Option<String>, Flow) {
        match Command::parse(line) {
            Ok(None) => (None, Flow::Continue),
            Ok(Some(Command::Quit)) => (Some(ok(json!({}))), Flow::Quit),
            Ok(Some(command)) => (Some(self.execute(command)), Flow::Continue),
            Err(e) => (Some(error(e)), Flow::Continue),
        }
    }

    fn execute(&self, command: Command) -> String {
        match command {
            Command::Get(key) => match self.governor.read_tunable(&key) {
                Ok(value) => ok(json!({ "key": key, "value": value })),
                Err(e) => error(e),
            },
            Command::Set(key, value) => match self.governor.write_tunable(&key, &value) {
                Ok(()) => ok(json!({ "key": key, "value": value.trim() })),
                Err(e) => error(e),
            },
            Command::Suspend => {
                self.power.suspend();
                ok(json!({ "phase": self.governor.phase() }))
            }
            Command::Resume => {
                self.power.resume();
                ok(json!({ "phase": self.governor.phase() }))
            }
            Command::Status => to_reply(&self.governor.status()),
            Command::Metrics => to_reply(&self.governor.metrics_snapshot()),
            Command::Load(core, pct) => match &self.simulated {
                Some(sim) if core < self.governor.status().cores.len() => {
                    sim.set_load(CoreId(core), pct);
                    ok(json!({ "core": core, "load": pct }))
                }
                Some(_) => error(format!("no such core {core}")),
                None => error("load is only available with the simulated backend"),
            },
            Command::Help => ok(json!({
                "commands": [
                    "get <key>", "set <key> <value>", "suspend", "resume",
                    "status", "metrics", "load <core> <percent>", "quit",
                ]
            })),
            Command::Quit => ok(json!({})),
        }
    }
}

fn ok(mut body: Value) -> String {
    if let Value::Object(map) = &mut body {
        map.insert("ok".into(), Value::Bool(true));
    }
    body.to_string()
}

fn error(e: impl ToString) -> String {
    json!({ "ok": false, "error": e.to_string() }).to_string()
}

fn to_reply(value: &impl serde::Serialize) -> String {
    match serde_json::to_value(value) {
        Ok(body) => ok(json!({ "data": body })),
        Err(e) => error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreplug_control::PolicyState;
    use coreplug_core::PowerEventSource;
    use coreplug_telemetry::HotplugMetrics;

    fn console(simulated: bool) -> Console {
        coreplug_telemetry::logging::init_for_tests();
        let sim = Arc::new(SimulatedCpus::new(8));
        let governor = Arc::new(Governor::new(
            PolicyState::new(8),
            sim.clone(),
            sim.clone(),
            Arc::new(HotplugMetrics::new()),
        ));
        let power = Arc::new(ManualPowerEvents::new());
        let target = Arc::clone(&governor);
        power
            .subscribe(Box::new(move |event| {
                target.handle_power_event(event);
            }))
            .unwrap();
        Console::new(governor, power, simulated.then_some(sim))
    }

    fn reply(console: &Console, line: &str) -> Value {
        let (text, _) = console.handle_line(line);
        serde_json::from_str(&text.expect("command should reply")).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  "), Ok(None));
        assert_eq!(
            Command::parse("set load_threshold 80"),
            Ok(Some(Command::Set("load_threshold".into(), "80".into())))
        );
        assert_eq!(Command::parse("load 3 45"), Ok(Some(Command::Load(3, 45))));
        assert!(Command::parse("load 3 150").is_err());
        assert!(Command::parse("dance").is_err());
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_get_and_set_round_trip() {
        let console = console(false);
        assert_eq!(reply(&console, "set sampling_rate 120")["ok"], true);
        let value = reply(&console, "get sampling_rate");
        assert_eq!(value["value"], "120");
    }

    #[test]
    fn test_rejected_write_reports_error() {
        let console = console(false);
        let value = reply(&console, "set endurance_level 7");
        assert_eq!(value["ok"], false);
        assert!(value["error"].as_str().unwrap().contains("endurance"));
    }

    #[test]
    fn test_suspend_and_status() {
        let console = console(false);
        assert_eq!(reply(&console, "suspend")["phase"], "suspended");
        let status = reply(&console, "status");
        assert_eq!(status["data"]["online_count"], 2);
        assert_eq!(reply(&console, "resume")["phase"], "active");
        assert_eq!(reply(&console, "metrics")["data"]["suspends"], 1);
    }

    #[test]
    fn test_load_needs_simulated_backend() {
        assert_eq!(reply(&console(false), "load 1 50")["ok"], false);
        let console = console(true);
        assert_eq!(reply(&console, "load 1 50")["ok"], true);
        assert_eq!(reply(&console, "load 9 50")["ok"], false);
    }

    #[test]
    fn test_quit_stops_the_loop() {
        let (_, flow) = console(false).handle_line("quit");
        assert_eq!(flow, Flow::Quit);
    }
}
