use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Terminal trace of the branch currently being explored, overwritten in
/// place and throttled to the update interval.
pub struct Logger {
    max_output_nodes: usize,
    update_freq: Duration,
    cleared: bool,
    path: Vec<(usize, usize, bool)>,
    last_update: Instant,
}

impl Logger {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(10, Duration::from_secs(10))
    }

    #[must_use]
    pub fn with_limits(max_output_nodes: usize, update_freq: Duration) -> Self {
        Self {
            max_output_nodes,
            update_freq,
            cleared: false,
            path: Vec::new(),
            last_update: Instant::now(),
        }
    }

    pub fn add_node(&mut self) {
        self.path.push((0, 0, false));
    }

    pub fn add_visited_node(&mut self, current_idx: usize, children: usize, multi_land: bool) {
        self.path.push((current_idx + 1, children, multi_land));
    }

    pub fn pop_node(&mut self) {
        self.path.pop();
    }

    pub fn update_last_node(&mut self, current_idx: usize, children: usize, multi_land: bool) {
        if let Some(last) = self.path.last_mut() {
            *last = (current_idx + 1, children, multi_land);
        }
    }

    pub fn log(&mut self) {
        if self.last_update.elapsed() < self.update_freq {
            return;
        }

        self.cleared = false;
        self.last_update = Instant::now();

        let mut line = String::new();
        for &(idx, children, multi_land) in self.path.iter().take(self.max_output_nodes) {
            line.push('(');
            line.push_str(&idx.to_string());
            line.push('/');
            line.push_str(&children.to_string());
            if multi_land {
                line.push('L');
            }
            line.push_str(")  ");
        }

        print!("\r{line:<width$}", width = 11 * self.max_output_nodes);
        let _ = io::stdout().flush();
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
    }

    pub fn clear_log(&mut self) {
        self.clear_path();
        if !self.cleared {
            println!("\r{:<width$}", "", width = 11 * self.max_output_nodes);
            self.cleared = true;
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
