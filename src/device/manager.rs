use log::{debug, info, trace};
use nalgebra::{UnitQuaternion, Vector3};

use super::{
    mounting_correction, DeviceClass, DeviceProvider, DeviceState, DeviceUse, Hand, RawDevice,
    RoomAdjust,
};
use crate::events::Event;

/// 生デバイスを6つの部位に割り当てる
///
/// 一度割り当てたデバイスは、一覧から消えるまで同じ部位に留まる。
/// 役割の問い合わせ結果が揺れても割り当ては変わらない。
pub struct DeviceManager {
    devices: Vec<RawDevice>,
    assigned: [Option<String>; 6],
    states: [Option<DeviceState>; 6],
    /// 汎用トラッカーを最初に観測した順
    first_seen: Vec<String>,
    triggers: [f32; 2],
    room_adjust: RoomAdjust,
    /// 割り当てが変わったときだけ発火
    pub devices_changed: Event<()>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            assigned: Default::default(),
            states: [None; 6],
            first_seen: Vec::new(),
            triggers: [0.0; 2],
            room_adjust: RoomAdjust::default(),
            devices_changed: Event::new(),
        }
    }

    pub fn try_get_device_state(&self, device_use: DeviceUse) -> Option<DeviceState> {
        self.states[device_use.index()]
    }

    /// 割り当て中のデバイスID
    pub fn assigned_device(&self, device_use: DeviceUse) -> Option<&str> {
        self.assigned[device_use.index()].as_deref()
    }

    /// このティックで読んだトリガー値 (コントローラが無ければ 0.0)
    pub fn trigger_value(&self, hand: Hand) -> f32 {
        match hand {
            Hand::Left => self.triggers[0],
            Hand::Right => self.triggers[1],
        }
    }

    pub fn room_adjust(&self) -> RoomAdjust {
        self.room_adjust
    }

    pub fn set_room_adjust(&mut self, room_adjust: RoomAdjust) {
        self.room_adjust = room_adjust;
    }

    /// プロバイダから一覧を取り込み、割り当てと状態を更新する。
    /// 割り当てが変わったら true
    pub fn tick(&mut self, provider: &mut dyn DeviceProvider) -> bool {
        let list_changed = provider.poll_devices(&mut self.devices);
        let changed = list_changed && self.assign_devices(&*provider);

        self.triggers = [
            provider.trigger_value(Hand::Left).unwrap_or(0.0),
            provider.trigger_value(Hand::Right).unwrap_or(0.0),
        ];
        self.update_states();

        if changed {
            self.devices_changed.emit(&());
        }
        changed
    }

    fn assign_devices(&mut self, provider: &dyn DeviceProvider) -> bool {
        debug!("Device list changed, updating device assignments");

        let devices = &self.devices;
        self.first_seen
            .retain(|id| devices.iter().any(|d| &d.id == id && d.is_connected));
        for device in devices.iter().filter(|d| d.is_connected) {
            if device.class == DeviceClass::GenericTracker
                && !self.first_seen.contains(&device.id)
            {
                info!("Found new tracker '{}'", device.id);
                self.first_seen.push(device.id.clone());
            }
        }

        let mut changed = false;

        for device_use in DeviceUse::ALL {
            let slot = &mut self.assigned[device_use.index()];
            let present = slot
                .as_ref()
                .map(|id| devices.iter().any(|d| &d.id == id && d.is_connected));
            if present == Some(false) {
                if let Some(id) = slot.take() {
                    info!("Lost device '{}' that was used as {}", id, device_use);
                }
                changed = true;
            }
        }

        let desired = self.resolve(provider);
        let devices = &self.devices;

        for device_use in DeviceUse::ALL {
            if self.assigned[device_use.index()].is_some() {
                continue;
            }
            let Some(index) = desired[device_use.index()] else {
                continue;
            };
            let id = &devices[index].id;
            if self.assigned.iter().flatten().any(|other| other == id) {
                trace!("Device '{}' is already in use, not using it as {}", id, device_use);
                continue;
            }
            info!("Using device '{}' as {}", id, device_use);
            self.assigned[device_use.index()] = Some(id.clone());
            changed = true;
        }

        changed
    }

    /// 今の一覧だけから決まる割り当て候補 (devices のインデックス)
    fn resolve(&self, provider: &dyn DeviceProvider) -> [Option<usize>; 6] {
        let mut desired: [Option<usize>; 6] = [None; 6];
        let mut unresolved = Vec::new();

        for (index, device) in self.devices.iter().enumerate() {
            if !device.is_connected {
                continue;
            }
            let direct = match device.class {
                DeviceClass::HeadMounted => Some(DeviceUse::Head),
                DeviceClass::Controller(Hand::Left) => Some(DeviceUse::LeftHand),
                DeviceClass::Controller(Hand::Right) => Some(DeviceUse::RightHand),
                DeviceClass::GenericTracker => {
                    let role = provider.tracker_role(&device.id);
                    trace!("Tracker '{}' has role {:?}", device.id, role);
                    let device_use = role.device_use();
                    if device_use.is_none() {
                        unresolved.push(index);
                    }
                    device_use
                }
                DeviceClass::Other => None,
            };

            if let Some(device_use) = direct {
                let slot = &mut desired[device_use.index()];
                if slot.is_none() {
                    *slot = Some(index);
                } else {
                    debug!("Ignoring extra device '{}' for {}", device.id, device_use);
                }
            }
        }

        // 役割の無いトラッカーは観測順に 左足 → 右足 → 腰。
        // 足に回すかどうかは割り当て済みのものも数えて決め、空いている枠だけを未割り当てのもので埋める
        unresolved.sort_by_key(|&index| {
            self.first_seen
                .iter()
                .position(|id| *id == self.devices[index].id)
                .unwrap_or(usize::MAX)
        });
        let enough_for_feet = unresolved.len() >= 2;
        let mut queue = unresolved.into_iter().filter(|&index| {
            let id = &self.devices[index].id;
            !self.assigned.iter().flatten().any(|other| other == id)
        });
        let is_free = |desired: &[Option<usize>; 6], device_use: DeviceUse| {
            desired[device_use.index()].is_none() && self.assigned[device_use.index()].is_none()
        };
        if enough_for_feet {
            for device_use in [DeviceUse::LeftFoot, DeviceUse::RightFoot] {
                if is_free(&desired, device_use) {
                    desired[device_use.index()] = queue.next();
                }
            }
        }
        if is_free(&desired, DeviceUse::Waist) {
            desired[DeviceUse::Waist.index()] = queue.next();
        }

        desired
    }

    fn update_states(&mut self) {
        for device_use in DeviceUse::ALL {
            let index = device_use.index();
            let device = self.assigned[index]
                .as_ref()
                .and_then(|id| self.devices.iter().find(|d| &d.id == id));

            let Some(device) = device else {
                self.states[index] = None;
                continue;
            };

            let was_tracking = self.states[index].map_or(false, |s| s.is_tracking);
            let is_tracking = device.is_connected && device.is_tracking;
            if is_tracking && !was_tracking {
                info!("Acquired tracking of device '{}'", device.id);
            } else if !is_tracking && was_tracking {
                info!("Lost tracking of device '{}'", device.id);
            }

            let mut state = DeviceState {
                is_connected: device.is_connected,
                is_tracking,
                position: Vector3::zeros(),
                rotation: UnitQuaternion::identity(),
            };
            if is_tracking {
                let mut pose = device.pose;
                if let Some(correction) = mounting_correction(&device.controller_type, device_use) {
                    pose.rotation *= correction;
                }
                let pose = self.room_adjust.apply(&pose);
                state.position = pose.position;
                state.rotation = pose.rotation;
            }
            self.states[index] = Some(state);
        }
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
