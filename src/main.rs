use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use mimalloc::MiMalloc;

use grundy::config::{Algorithm, SolverConfig};
use grundy::error::SolverResult;
use grundy::game::Outcome;
use grundy::games::Kayles;
use grundy::solver::master::MasterConfig;
use grundy::solver::{
    BasicPnsSolver, Couple, DfpnSolver, DfsSolver, MasterSolver, Nimber, NimberDatabase,
    ParallelDfpn, PnsSolver,
};
use grundy::stats::{self, SolveStats};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(version, about = "不偏组合博弈的并行证明数求解器")]
struct Args {
    /// 待求解的局面，例如 "5+3" 表示两排 5 根和 3 根的 Kayles
    position: String,

    #[clap(long, value_enum)]
    algorithm: Option<Algorithm>,

    /// 计算局面的 Grundy 值而不仅是胜负
    #[clap(long, action = clap::ArgAction::SetTrue)]
    compute_nimber: bool,

    /// 置换表容量
    #[clap(long)]
    capacity: Option<usize>,

    #[clap(long)]
    input_database: Option<PathBuf>,

    #[clap(long)]
    output_database: Option<PathBuf>,

    #[clap(long)]
    stats_path: Option<PathBuf>,

    #[clap(long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    /// 随机种子，0 表示不随机化
    #[clap(long)]
    seed: Option<u64>,

    /// 分布式求解的工作进程数
    #[clap(long)]
    workers: Option<usize>,

    /// 每个工作进程的线程数，0 为 DFPN，大于 0 为 PDFPN
    #[clap(long)]
    threads: Option<usize>,

    /// 每个任务的最大迭代数
    #[clap(long)]
    iterations: Option<usize>,

    /// 主树的更新频率
    #[clap(long)]
    updates: Option<usize>,

    /// 共享 nimber 数据库的工作进程组大小
    #[clap(long)]
    grouping: Option<usize>,

    /// 禁止工作进程组之间共享 nimber
    #[clap(long, action = clap::ArgAction::SetTrue)]
    no_sharing: bool,

    /// 工作进程状态保留级别：0 全保留，1 仅 nimber，2 不保留
    #[clap(long)]
    state_level: Option<u8>,

    /// 外部集群地址
    #[clap(long, default_value = "")]
    address: String,

    /// 从 YAML 文件读取配置，命令行参数优先
    #[clap(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> SolverResult<(SolverConfig, String, String)> {
        let mut config = match &self.config {
            Some(path) => SolverConfig::load(path)?,
            None => SolverConfig::default(),
        };

        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        config.compute_nimber |= self.compute_nimber;
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if self.input_database.is_some() {
            config.input_database = self.input_database;
        }
        if let Some(output_database) = self.output_database {
            config.output_database = output_database;
        }
        if let Some(stats_path) = self.stats_path {
            config.stats_path = stats_path;
        }
        config.verbose |= self.verbose;
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(updates) = self.updates {
            config.updates = updates;
        }
        if let Some(grouping) = self.grouping {
            config.grouping = grouping;
        }
        config.no_sharing |= self.no_sharing;
        if let Some(state_level) = self.state_level {
            config.state_level = state_level;
        }

        Ok((config, self.position, self.address))
    }
}

struct SolveResult {
    outcome: Outcome,
    tree_size: usize,
    nimbers: usize,
    iterations: usize,
}

fn solve_once(
    config: &SolverConfig,
    position: &Kayles,
    nimber: Nimber,
) -> SolverResult<SolveResult> {
    let couple = Couple::new(position.clone(), nimber);

    if config.algorithm == Algorithm::PnsPdfpn {
        let master_config = MasterConfig {
            workers: config.workers,
            threads: config.threads,
            iterations: config.iterations,
            updates: config.updates,
            grouping: config.grouping,
            branching_depth: config.branching_depth,
            epsilon: config.epsilon,
            capacity: config.capacity,
            estimator: config.estimator(),
            state_level: config.state_level,
            no_sharing: config.no_sharing,
            verbose: config.verbose,
            seed: config.seed,
            input_database: config.input_database.clone(),
        };

        let mut master: MasterSolver<Kayles> = MasterSolver::new(&master_config)?;
        let outcome = master.solve_couple(&couple)?;
        master.store_database(&config.output_database)?;
        return Ok(SolveResult {
            outcome,
            tree_size: master.tree_size(),
            nimbers: master.nimbers(),
            iterations: master.total_iterations(),
        });
    }

    let db = Arc::new(NimberDatabase::new(false));
    if let Some(path) = &config.input_database {
        let loaded = db.load(path)?;
        if config.verbose {
            println!("已从 {} 载入 {loaded} 个 nimber", path.display());
        }
    }

    let result = match config.algorithm {
        Algorithm::Dfs => {
            let mut solver = DfsSolver::new(Arc::clone(&db), config.verbose);
            let outcome = solver.solve_couple(&couple);
            SolveResult {
                outcome,
                tree_size: solver.max_tree_size(),
                nimbers: db.len(),
                iterations: solver.iterations(),
            }
        }
        Algorithm::Pns => {
            let mut solver = BasicPnsSolver::new(
                Arc::clone(&db),
                config.verbose,
                config.estimator(),
                config.seed,
            );
            let outcome = solver.solve_couple(&couple)?;
            SolveResult {
                outcome,
                tree_size: solver.tree_size(),
                nimbers: db.len(),
                iterations: solver.iterations(),
            }
        }
        Algorithm::Dfpn => {
            let mut solver = DfpnSolver::new(
                Arc::clone(&db),
                config.verbose,
                config.estimator(),
                config.capacity,
                config.seed,
            );
            solver.set_epsilon(config.epsilon);
            let outcome = solver.solve_couple(&couple)?;
            SolveResult {
                outcome,
                tree_size: solver.tree_size(),
                nimbers: db.len(),
                iterations: solver.iterations(),
            }
        }
        Algorithm::Pdfpn => {
            let mut solver = ParallelDfpn::new(
                config.threads.max(1),
                config.branching_depth,
                config.epsilon,
                Arc::clone(&db),
                config.estimator(),
                config.capacity,
                config.seed,
            );
            let outcome = solver.solve_couple(&couple)?;
            SolveResult {
                outcome,
                tree_size: solver.tree_size(),
                nimbers: db.len(),
                iterations: solver.iterations(),
            }
        }
        Algorithm::PnsPdfpn => unreachable!(),
    };

    db.store(&config.output_database, true)?;
    Ok(result)
}

fn run() -> SolverResult<Outcome> {
    let args = Args::parse();
    let (config, position_str, address) = args.into_config()?;

    if !address.is_empty() {
        eprintln!("外部集群传输未内置，忽略 --address，改为本地求解");
    }

    let position: Kayles = position_str.parse()?;
    let mut nimber = Nimber::LOSS;
    loop {
        let start = Instant::now();
        let result = solve_once(&config, &position, nimber)?;
        let solving_time = start.elapsed().as_secs_f64();

        let outcome_str = match result.outcome {
            Outcome::Win => "先手胜",
            Outcome::Loss => "先手负",
            Outcome::Unknown => "未知",
        };
        println!(
            "局面 {position} nimber {nimber}: {outcome_str} ({solving_time:.2} 秒, {} 次迭代, {} 个 nimber)",
            result.iterations, result.nimbers
        );

        stats::append_csv(
            &config.stats_path,
            &SolveStats {
                position: position.to_string(),
                nimber: nimber.0,
                outcome: result.outcome,
                solving_time_secs: solving_time,
                tree_size: result.tree_size,
                nimbers: result.nimbers,
                iterations: result.iterations,
            },
        )?;

        if !config.compute_nimber || result.outcome.is_loss() {
            if config.compute_nimber {
                println!("局面 {position} 的 Grundy 值为 {nimber}");
            }
            return Ok(result.outcome);
        }

        nimber = nimber.next();
    }
}

fn main() {
    match run() {
        Ok(outcome) if !outcome.is_unknown() => {}
        Ok(_) => process::exit(2),
        Err(err) => {
            eprintln!("错误: {err}");
            process::exit(1);
        }
    }
}
