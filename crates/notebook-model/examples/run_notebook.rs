//! Drive a notebook through a scripted editing session with an echo kernel.
//!
//! Run with: cargo run -p notebook-model --example run_notebook

use std::sync::atomic::{AtomicI32, Ordering};

use notebook_model::{
    actions, spawn_placeholder_guard, CellModel, ExecuteReply, ExecutionHandle, NotebookModel,
    NotebookPanel,
};

/// Kernel that acknowledges every execution with a running count.
#[derive(Default)]
struct EchoKernel {
    counter: AtomicI32,
}

impl ExecutionHandle for EchoKernel {
    async fn execute(&self, source: &str) -> anyhow::Result<ExecuteReply> {
        println!("kernel <- {source}");
        Ok(ExecuteReply::ok(
            self.counter.fetch_add(1, Ordering::Relaxed) + 1,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let model = NotebookModel::new().into_shared();
    spawn_placeholder_guard(&model);
    let mut panel = NotebookPanel::new(model.clone());
    let kernel = EchoKernel::default();

    // Author a small notebook.
    {
        let mut m = model.lock().unwrap();
        let id = m.cells().get(0).unwrap().id().clone();
        m.update_cell_source(&id, "import sys");
        let cells = m.cells_mut();
        cells.push_back(CellModel::new_markdown("# Demo"));
        cells.push_back(CellModel::new_code("print(sys.version)"));
    }

    // Run every cell: markdown renders, code goes to the kernel.
    let len = model.lock().unwrap().cells().len();
    panel.view.set_active(Some(0));
    for i in 0..len {
        panel.view.select(i);
    }
    let ok = actions::run_cells(&mut panel, Some(&kernel)).await;
    println!("run all -> {ok}");

    // One undoable step: split the last code cell, then undo it.
    panel.view.set_active(Some(2));
    actions::split_cell(&mut panel, 6);
    println!(
        "after split: {} cells",
        model.lock().unwrap().cells().len()
    );
    actions::undo(&mut panel);
    println!(
        "after undo:  {} cells",
        model.lock().unwrap().cells().len()
    );

    let json = serde_json::to_string_pretty(&model.lock().unwrap().to_json())?;
    println!("{json}");
    Ok(())
}
