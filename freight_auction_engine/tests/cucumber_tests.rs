mod cucumber;

use ::cucumber::{codegen::LocalBoxFuture, event::ScenarioFinished, gherkin, writer, World};
use futures_util::FutureExt;
use log::*;
use tokio::runtime::Runtime;

use crate::cucumber::AuctionWorld;

fn main() {
    dotenvy::from_filename(".env.test").ok();
    env_logger::init();
    let sys = Runtime::new().unwrap();
    sys.block_on(
        AuctionWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .after(|_f, _r, scenario, ev, w| post_test_hook(scenario, ev, w))
            .run("tests/features"),
    );
    info!("🚀️ Tests complete");
}

fn post_test_hook<'a>(
    scenario: &'a gherkin::Scenario,
    ev: &'a ScenarioFinished,
    world: Option<&'a mut AuctionWorld>,
) -> LocalBoxFuture<'a, ()> {
    let fut = async move {
        trace!("🚀️ After-scenario hook running for \"{}\"", scenario.name);
        match (ev, world) {
            (ScenarioFinished::StepFailed(_, _, _), Some(world)) => {
                error!("🚀️ Scenario \"{}\" failed. Events seen: {:?}", scenario.name, world.events());
            },
            (_, Some(world)) => world.shutdown().await,
            (_, None) => warn!("🚀️ World was not specified. Nothing to clean up."),
        }
        trace!("🚀️ After-scenario hook complete");
    };
    fut.boxed_local()
}
