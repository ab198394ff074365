use nous_core::NousError;

use super::types::{SchedulerConfig, MAX_FIRE_DELAY_LIMIT};

impl SchedulerConfig {
    /// Validate the config: unit ranges, min/max pairs and capacities.
    pub fn validate(&self) -> Result<(), NousError> {
        self.validate_capacities()?;
        self.validate_unit_ranges()?;
        self.validate_fire_ranges()?;
        self.validate_selection()?;
        Ok(())
    }

    fn validate_capacities(&self) -> Result<(), NousError> {
        for (name, value) in [
            ("max_concepts", self.max_concepts),
            ("max_pending", self.max_pending),
            ("task_link_capacity", self.task_link_capacity),
            ("term_link_capacity", self.term_link_capacity),
        ] {
            if value == 0 {
                return Err(NousError::Config(format!("{name} must be greater than 0")));
            }
        }
        if self.max_sub_concepts == Some(0) {
            return Err(NousError::Config(
                "max_sub_concepts must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    fn validate_unit_ranges(&self) -> Result<(), NousError> {
        for (name, value) in [
            ("activation_epsilon", self.activation_epsilon),
            ("priority_decay_rate", self.priority_decay_rate),
            ("link_decay_rate", self.link_decay_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NousError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Ensure every `min_*` does not exceed its `max_*`.
    fn validate_fire_ranges(&self) -> Result<(), NousError> {
        if self.min_task_link > self.max_task_link {
            return Err(NousError::Config(format!(
                "min_task_link {} exceeds max_task_link {}",
                self.min_task_link, self.max_task_link
            )));
        }
        if self.min_term_link > self.max_term_link {
            return Err(NousError::Config(format!(
                "min_term_link {} exceeds max_term_link {}",
                self.min_term_link, self.max_term_link
            )));
        }
        Ok(())
    }

    fn validate_selection(&self) -> Result<(), NousError> {
        if !(self.selection_exponent.is_finite() && self.selection_exponent > 0.0) {
            return Err(NousError::Config(format!(
                "selection_exponent must be a positive number, got {}",
                self.selection_exponent
            )));
        }
        if !(1..=MAX_FIRE_DELAY_LIMIT).contains(&self.max_fire_delay) {
            return Err(NousError::Config(format!(
                "max_fire_delay must be within [1, {MAX_FIRE_DELAY_LIMIT}], got {}",
                self.max_fire_delay
            )));
        }
        Ok(())
    }
}
