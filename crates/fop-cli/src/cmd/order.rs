use crate::output::{print_json, print_table};
use anyhow::Context;
use fop_core::lifting_order::lifting_order;
use fop_core::roster::{Roster, YamlRoster};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct OrderRow {
    rank: usize,
    id: u64,
    start_number: Option<u32>,
    name: String,
    team: String,
    lift: Option<&'static str>,
    attempt: Option<u8>,
    weight: Option<u32>,
}

pub fn run(config: Option<&Path>, roster: &Path, group: &str, json: bool) -> anyhow::Result<()> {
    let config = super::config::load(config)?;
    let roster = YamlRoster::open(roster)
        .with_context(|| format!("failed to open roster {}", roster.display()))?;
    let Some(group) = roster.group(group)? else {
        let known = roster.group_names()?.join(", ");
        anyhow::bail!("group '{group}' not found (groups: {known})");
    };

    let rows: Vec<OrderRow> = lifting_order(&group.athletes, config.competition.gender_order)
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let attempt = a.next_attempt();
            OrderRow {
                rank: i + 1,
                id: a.id.0,
                start_number: a.start_number,
                name: a.full_name(),
                team: a.team.clone(),
                lift: attempt.map(|_| a.lift_type().as_str()),
                attempt,
                weight: attempt.map(|_| a.next_requested_weight()),
            }
        })
        .collect();

    if json {
        return print_json(&rows);
    }

    let cell = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.rank.to_string(),
                cell(r.start_number.map(|n| n.to_string())),
                r.name.clone(),
                r.team.clone(),
                cell(r.lift.map(str::to_string)),
                cell(r.attempt.map(|n| n.to_string())),
                cell(r.weight.map(|w| w.to_string())),
            ]
        })
        .collect();
    print_table(&["#", "Start", "Name", "Team", "Lift", "Att", "Kg"], &table);
    if group.done {
        println!("\nGroup {} is done.", group.name);
    }
    Ok(())
}
