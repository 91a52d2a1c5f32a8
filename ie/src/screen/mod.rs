pub mod missionboard;
