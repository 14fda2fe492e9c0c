use shared::{GridPoint, Heading, TurnDirection, VehicleId, VehicleSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    Alive,
    /// Waiting out the respawn delay.
    Dead,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub color: String,
    pub position: GridPoint,
    pub heading: Heading,
    pub state: VehicleState,
    pub score: u32,
}

impl Vehicle {
    pub fn new(id: VehicleId, color: String, position: GridPoint, heading: Heading) -> Self {
        Self {
            id,
            color,
            position,
            heading,
            state: VehicleState::Alive,
            score: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == VehicleState::Alive
    }

    /// Rotates a quarter turn. Ignored while dead.
    pub fn turn(&mut self, direction: TurnDirection) {
        if self.is_alive() {
            self.heading = self.heading.turned(direction);
        }
    }

    /// Cell the vehicle would occupy after one step, or `None` while dead.
    pub fn candidate_position(&self) -> Option<GridPoint> {
        if !self.is_alive() {
            return None;
        }
        let (dx, dz) = self.heading.step();
        Some(self.position.offset(dx, dz))
    }

    pub fn commit_move(&mut self, position: GridPoint) {
        self.position = position;
    }

    pub fn kill(&mut self) {
        self.state = VehicleState::Dead;
    }

    pub fn respawn(&mut self, position: GridPoint, heading: Heading) {
        self.position = position;
        self.heading = heading;
        self.state = VehicleState::Alive;
    }

    pub fn award_point(&mut self) -> u32 {
        self.score += 1;
        self.score
    }

    pub fn snapshot(&self, trail: Vec<GridPoint>) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.id,
            color: self.color.clone(),
            position: self.position,
            heading: self.heading,
            alive: self.is_alive(),
            score: self.score,
            trail,
        }
    }
}
