use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::ValueEnum;

use crate::config::Settings;
use crate::filter::{Dimension, Filter};
use crate::loader::{LoadCache, LoadOptions};
use crate::pipeline::{Pipeline, View};
use crate::report;

const HELP: &str = "commands:
  filter <field>=<value>[,value]   add a selection (fields combine with AND)
  clear [field]                    drop one or all selections
  show <view> [key,key]            run a view: risk, delays, capacity, finance,
                                   mobilization, queue, bottlenecks, tma
  options                          cascading filter options
  quit";

/// Line-oriented session: every command re-runs the pipeline against the
/// cached load of the input file.
pub struct Session<'s> {
    settings: &'s Settings,
    input: PathBuf,
    options: LoadOptions,
    cache: LoadCache,
    filter: Filter,
}

impl<'s> Session<'s> {
    pub fn new(settings: &'s Settings, input: PathBuf, options: LoadOptions, filter: Filter) -> Self {
        Self {
            settings,
            input,
            options,
            cache: LoadCache::new(),
            filter,
        }
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> anyhow::Result<()> {
        writeln!(out, "{HELP}")?;
        for line in input.lines() {
            let line = line.context("failed to read command")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "quit" | "exit") {
                break;
            }
            match self.execute(line) {
                Ok(text) => write!(out, "{text}")?,
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
            out.flush()?;
        }
        Ok(())
    }

    fn execute(&mut self, line: &str) -> anyhow::Result<String> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "help" => Ok(format!("{HELP}\n")),
            "filter" => {
                self.filter.add_expr(rest, &self.settings.aliases)?;
                Ok(format!("{} rows selected\n", self.selected_rows()?))
            }
            "clear" if rest.is_empty() => {
                self.filter = Filter::new();
                Ok("filters cleared\n".to_string())
            }
            "clear" => {
                let dimension = Dimension::parse(rest)
                    .with_context(|| format!("unknown field '{rest}'"))?;
                self.filter.clear(dimension);
                Ok(format!("{dimension} cleared\n"))
            }
            "options" => {
                let dataset = self.cache.get_or_load(&self.input, &self.options)?;
                let options = Pipeline::new(self.settings).options(&dataset, &self.filter);
                Ok(report::render_options(&options))
            }
            "show" => {
                let (view, keys) = rest.split_once(' ').unwrap_or((rest, ""));
                let view = View::from_str(view, true)
                    .map_err(|_| anyhow::anyhow!("unknown view '{view}'"))?;
                let keys = parse_keys(keys)?;
                let dataset = self.cache.get_or_load(&self.input, &self.options)?;
                let analysis = Pipeline::new(self.settings).run(&dataset, view, &keys, &self.filter)?;
                Ok(format!("## {}\n{}", view.title(), report::render(&analysis)))
            }
            other => bail!("unknown command '{other}', try 'help'"),
        }
    }

    fn selected_rows(&mut self) -> anyhow::Result<usize> {
        let dataset = self.cache.get_or_load(&self.input, &self.options)?;
        Ok(Pipeline::new(self.settings).select(&dataset, &self.filter).len())
    }

    #[cfg(test)]
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }
}

/// Comma separated grouping keys; empty means the view's default.
pub fn parse_keys(raw: &str) -> anyhow::Result<Vec<Dimension>> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| Dimension::parse(key).with_context(|| format!("unknown grouping key '{key}'")))
        .collect()
}
