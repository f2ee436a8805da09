use behavior_client::EventType;

use crate::event::CandidateEvent;

/// The single page-view candidate emitted once startup completes.
pub fn page_view() -> CandidateEvent {
    CandidateEvent::new(EventType::PageView)
}
