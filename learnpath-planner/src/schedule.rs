//! Greedy next-fit packing of lessons into weeks.

use learnpath_core::model::Lesson;

pub(crate) struct WeekPacker {
    weekly_minutes: u32,
    week: u32,
    used: u32,
    seq: u32,
}

impl WeekPacker {
    pub(crate) fn new(weekly_minutes: u32) -> Self {
        Self {
            weekly_minutes,
            week: 0,
            used: 0,
            seq: 0,
        }
    }

    /// Whether a lesson of this length can ever be placed.
    pub(crate) fn admits(&self, minutes: u32) -> bool {
        minutes <= self.weekly_minutes
    }

    /// Assign week and sequence. A lesson that overflows the current week opens the next.
    pub(crate) fn place(&mut self, lesson: &mut Lesson) {
        let minutes = lesson.duration_min;
        if self.week == 0 || (self.used > 0 && self.used + minutes > self.weekly_minutes) {
            self.week += 1;
            self.used = 0;
            self.seq = 0;
        }
        self.used += minutes;
        self.seq += 1;
        lesson.week = self.week;
        lesson.seq = self.seq;
    }

    pub(crate) fn weeks(&self) -> u32 {
        self.week
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_core::model::Skill;

    fn lesson(minutes: u32) -> Lesson {
        let mut lesson = crate::select::lesson(&Skill::new("s", "S", "s"), vec![], None);
        lesson.duration_min = minutes;
        lesson
    }

    #[test]
    fn packs_in_order_without_exceeding_week() {
        let mut packer = WeekPacker::new(300);
        let placed: Vec<(u32, u32)> = [180, 120, 150, 120]
            .into_iter()
            .map(|m| {
                let mut l = lesson(m);
                packer.place(&mut l);
                (l.week, l.seq)
            })
            .collect();
        assert_eq!(placed, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
        assert_eq!(packer.weeks(), 2);
    }

    #[test]
    fn empty_lessons_share_the_current_week() {
        let mut packer = WeekPacker::new(60);
        let mut a = lesson(60);
        let mut b = lesson(0);
        packer.place(&mut a);
        packer.place(&mut b);
        assert_eq!((b.week, b.seq), (1, 2));
        assert!(!packer.admits(61));
    }

    #[test]
    fn no_lessons_means_no_weeks() {
        assert_eq!(WeekPacker::new(60).weeks(), 0);
    }
}
