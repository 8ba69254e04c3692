//! End-to-end scenarios (spec §8) driving a full agent engine against a
//! full controller engine over an in-memory [`MockTransport`] pair.

use std::sync::Arc;
use std::time::Duration;

use meshc2::agent_engine::AgentEngine;
use meshc2::controller_engine::ControllerEngine;
use meshc2::transport::MockTransport;

fn spawn_agent(max_payload: usize, timeout: Duration) -> (tokio::task::JoinHandle<()>, MockTransport) {
    let (agent_side, controller_side) = MockTransport::pair("agent", "controller");
    let engine = Arc::new(AgentEngine::new(Arc::new(agent_side), timeout, max_payload));
    let handle = tokio::spawn(Arc::clone(&engine).run());
    (handle, controller_side)
}

#[tokio::test]
async fn short_command_round_trips_cleanly() {
    let (agent_handle, controller_side) = spawn_agent(200, Duration::from_secs(5));
    let controller = ControllerEngine::new(controller_side);

    let result = controller
        .send_and_listen("echo alice", Duration::from_secs(3), Duration::from_millis(100))
        .await;

    assert!(result.received);
    assert!(result.output.contains("alice"));
    assert!(result.output.contains("Timing:"));
    assert!(!result.output.ends_with("Done"));

    agent_handle.abort();
}

#[tokio::test]
async fn multi_chunk_output_is_pulled_and_assembled_in_order() {
    let (agent_handle, controller_side) = spawn_agent(80, Duration::from_secs(5));
    let controller = ControllerEngine::new(controller_side);

    let command = "printf 'line-%s\\n' 1 2 3 4 5 6 7 8 9 10";
    let result = controller
        .send_and_listen(command, Duration::from_secs(10), Duration::from_millis(50))
        .await;

    assert!(result.received);
    for n in 1..=10 {
        assert!(
            result.output.contains(&format!("line-{n}")),
            "missing line-{n} in {:?}",
            result.output
        );
    }

    agent_handle.abort();
}

#[tokio::test]
async fn paging_past_the_end_of_a_short_reply_still_terminates() {
    let (agent_handle, controller_side) = spawn_agent(200, Duration::from_secs(5));
    let controller = ControllerEngine::new(controller_side);

    let result = controller
        .send_and_listen("echo done-quick", Duration::from_secs(3), Duration::from_millis(50))
        .await;

    assert!(result.received);
    assert!(result.output.contains("done-quick"));

    agent_handle.abort();
}

#[tokio::test]
async fn session_cd_is_scoped_per_sender() {
    let (agent_side, controller_side) = MockTransport::pair("agent", "controller");
    let engine = Arc::new(AgentEngine::new(Arc::new(agent_side), Duration::from_secs(5), 200));
    let agent_handle = tokio::spawn(Arc::clone(&engine).run());
    let controller = ControllerEngine::new(controller_side);

    let cd_result = controller
        .send_and_listen("cd /tmp", Duration::from_secs(3), Duration::from_millis(50))
        .await;
    assert!(cd_result.output.contains("CWD:/tmp") || cd_result.output.contains("CWD:/private/tmp"));

    let pwd_result = controller
        .send_and_listen("pwd", Duration::from_secs(3), Duration::from_millis(50))
        .await;
    assert!(pwd_result.output.contains("/tmp"));

    agent_handle.abort();
}

#[tokio::test]
async fn timeout_kills_the_process_and_annotates_the_reply() {
    let (agent_handle, controller_side) = spawn_agent(200, Duration::from_secs(1));
    let controller = ControllerEngine::new(controller_side);

    let result = controller
        .send_and_listen("sleep 10", Duration::from_secs(5), Duration::from_millis(100))
        .await;

    assert!(result.received);
    assert!(result.output.contains("Command timed out after"));

    agent_handle.abort();
}

#[tokio::test]
async fn deadline_exceeded_with_no_agent_reports_failure() {
    let (_agent_side, controller_side) = MockTransport::pair("agent", "controller");
    let controller = ControllerEngine::new(controller_side);

    let result = controller
        .send_and_listen("whoami", Duration::from_millis(200), Duration::from_millis(50))
        .await;

    assert!(!result.received);
    assert!(result.output.is_empty());
}
