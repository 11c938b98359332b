use std::collections::BTreeSet;
use std::sync::Arc;

use qm_core::{
    CheckFlag, CheckFlavor, EffectiveCheckFlag, EffectivePermission, Scope, TriState, WhitelistEntry,
    default_check_flag,
};
use qm_gateway_client::GatewayClient;
use qm_hr_client::{Department, Employee, HrClient};
use qm_state::{LedgerStore, Transaction};

use crate::config::{PermissionConfig, SyncMode};
use crate::department;
use crate::error::PermissionError;

/// Composes effective permissions/flags from user- and department-scope
/// settings and pushes only the deltas to the gateway (spec §4.6).
///
/// Holds no roster cache across calls: every mutation that needs the
/// employee→department-path mapping re-polls [`HrClient`], matching spec
/// §9's "maintains no in-memory cache that survives a request beyond the
/// transaction scope."
pub struct PermissionComposer {
    state: Arc<dyn LedgerStore>,
    gateway: Arc<dyn GatewayClient>,
    hr: Arc<dyn HrClient>,
    config: PermissionConfig,
}

impl PermissionComposer {
    #[must_use]
    pub fn new(
        state: Arc<dyn LedgerStore>,
        gateway: Arc<dyn GatewayClient>,
        hr: Arc<dyn HrClient>,
        config: PermissionConfig,
    ) -> Self {
        Self { state, gateway, hr, config }
    }

    async fn roster(&self) -> Result<(Vec<Employee>, Vec<Department>), PermissionError> {
        let employees = self.hr.list_employees().await?;
        let departments = self.hr.list_departments().await?;
        Ok((employees, departments))
    }

    /// Resolve a user key to its department path, honoring the configured
    /// sync mode. Strict mode rejects unknown keys; permissive mode treats
    /// them as unaffiliated (empty department chain).
    fn resolve_path<'a>(
        &self,
        user_key: &str,
        employees: &'a [Employee],
    ) -> Result<Option<&'a str>, PermissionError> {
        match employees.iter().find(|e| e.employee_number == user_key) {
            Some(e) => Ok(Some(e.department_path.as_str())),
            None if self.config.sync_mode == SyncMode::Strict => {
                Err(PermissionError::UserNotFound(user_key.to_owned()))
            }
            None => Ok(None),
        }
    }

    /// Set a user's model whitelist (spec §4.6 `set_user_whitelist`).
    pub async fn set_user_whitelist(
        &self,
        user_key: &str,
        models: BTreeSet<String>,
    ) -> Result<(), PermissionError> {
        let (employees, _) = self.roster().await?;
        self.resolve_path(user_key, &employees)?;

        let mut tx = self.state.begin().await?;
        tx.save_whitelist(&WhitelistEntry { scope: Scope::User, key: user_key.to_owned(), models: models.clone() })
            .await?;
        let prior = tx.find_effective_permission(user_key).await?;
        let changed = prior.as_ref().map(|p| &p.models) != Some(&models);
        tx.save_effective_permission(&EffectivePermission { user_id: user_key.to_owned(), models: models.clone() })
            .await?;
        tx.commit().await?;

        if changed {
            let list: Vec<String> = models.into_iter().collect();
            self.gateway.push_model_permission(user_key, &list).await?;
        }
        Ok(())
    }

    /// Set a department's model whitelist and push to every affected
    /// employee (spec §4.6 `set_department_whitelist`).
    pub async fn set_department_whitelist(
        &self,
        dept_key: &str,
        models: BTreeSet<String>,
    ) -> Result<(), PermissionError> {
        let (employees, departments) = self.roster().await?;
        let members = department_members(dept_key, &employees, &departments)?;

        let mut tx = self.state.begin().await?;
        tx.save_whitelist(&WhitelistEntry { scope: Scope::Department, key: dept_key.to_owned(), models })
            .await?;

        let mut changed = Vec::new();
        for emp in &members {
            let chain = department::chain_for(&departments, &emp.department_path);
            let effective = effective_models(tx.as_mut(), &emp.employee_number, &chain).await?;
            let prior = tx.find_effective_permission(&emp.employee_number).await?;
            if prior.as_ref().map(|p| &p.models) != Some(&effective) {
                changed.push((emp.employee_number.clone(), effective.clone()));
            }
            tx.save_effective_permission(&EffectivePermission {
                user_id: emp.employee_number.clone(),
                models: effective,
            })
            .await?;
        }
        tx.commit().await?;

        for (user_id, models) in changed {
            let list: Vec<String> = models.into_iter().collect();
            self.gateway.push_model_permission(&user_id, &list).await?;
        }
        Ok(())
    }

    /// Set a user's check-flag tri-state (spec §4.6 `set_user_check_flag`).
    pub async fn set_user_check_flag(
        &self,
        user_key: &str,
        flavor: CheckFlavor,
        state: TriState,
    ) -> Result<(), PermissionError> {
        let (employees, departments) = self.roster().await?;
        let path = self.resolve_path(user_key, &employees)?;
        let chain = path.map_or_else(Vec::new, |p| department::chain_for(&departments, p));

        let mut tx = self.state.begin().await?;
        tx.save_check_flag(&CheckFlag { flavor, scope: Scope::User, key: user_key.to_owned(), state }).await?;
        let effective = effective_check_flag(tx.as_mut(), flavor, user_key, &chain).await?;
        let prior = tx.find_effective_check_flag(user_key, flavor).await?;
        let changed = prior.map(|f| f.enabled) != Some(effective);
        tx.save_effective_check_flag(user_key, EffectiveCheckFlag { flavor, enabled: effective }).await?;
        tx.commit().await?;

        if changed {
            push_flag(self.gateway.as_ref(), flavor, user_key, effective).await?;
        }
        Ok(())
    }

    /// Set a department's check-flag tri-state for every member (spec §4.6
    /// `set_department_check_flag`).
    pub async fn set_department_check_flag(
        &self,
        dept_key: &str,
        flavor: CheckFlavor,
        state: TriState,
    ) -> Result<(), PermissionError> {
        let (employees, departments) = self.roster().await?;
        let members = department_members(dept_key, &employees, &departments)?;

        let mut tx = self.state.begin().await?;
        tx.save_check_flag(&CheckFlag { flavor, scope: Scope::Department, key: dept_key.to_owned(), state })
            .await?;

        let mut changed = Vec::new();
        for emp in &members {
            let chain = department::chain_for(&departments, &emp.department_path);
            let effective = effective_check_flag(tx.as_mut(), flavor, &emp.employee_number, &chain).await?;
            let prior = tx.find_effective_check_flag(&emp.employee_number, flavor).await?;
            if prior.map(|f| f.enabled) != Some(effective) {
                changed.push((emp.employee_number.clone(), effective));
            }
            tx.save_effective_check_flag(&emp.employee_number, EffectiveCheckFlag { flavor, enabled: effective })
                .await?;
        }
        tx.commit().await?;

        for (user_id, enabled) in changed {
            push_flag(self.gateway.as_ref(), flavor, &user_id, enabled).await?;
        }
        Ok(())
    }

    /// Pull the current employee→department mapping and push only the
    /// diffs against previously persisted effective rows (spec §4.6 "HR
    /// sync"). Removed employees have their derived rows purged.
    pub async fn sync_hr(&self) -> Result<(), PermissionError> {
        let (employees, departments) = self.roster().await?;
        let current: BTreeSet<&str> = employees.iter().map(|e| e.employee_number.as_str()).collect();

        let mut tx = self.state.begin().await?;

        let known = tx.list_known_user_ids().await?;
        let mut removed = Vec::new();
        for user_id in &known {
            if !current.contains(user_id.as_str()) {
                tx.delete_effective_rows(user_id).await?;
                removed.push(user_id.clone());
            }
        }

        let mut model_pushes = Vec::new();
        let mut flag_pushes = Vec::new();
        for emp in &employees {
            let chain = department::chain_for(&departments, &emp.department_path);

            let models = effective_models(tx.as_mut(), &emp.employee_number, &chain).await?;
            let prior_models = tx.find_effective_permission(&emp.employee_number).await?;
            if prior_models.as_ref().map(|p| &p.models) != Some(&models) {
                model_pushes.push((emp.employee_number.clone(), models.clone()));
            }
            tx.save_effective_permission(&EffectivePermission { user_id: emp.employee_number.clone(), models })
                .await?;

            for flavor in [CheckFlavor::StarCheck, CheckFlavor::QuotaCheck] {
                let enabled = effective_check_flag(tx.as_mut(), flavor, &emp.employee_number, &chain).await?;
                let prior_flag = tx.find_effective_check_flag(&emp.employee_number, flavor).await?;
                if prior_flag.map(|f| f.enabled) != Some(enabled) {
                    flag_pushes.push((emp.employee_number.clone(), flavor, enabled));
                }
                tx.save_effective_check_flag(&emp.employee_number, EffectiveCheckFlag { flavor, enabled })
                    .await?;
            }
        }

        tx.commit().await?;

        for (user_id, models) in model_pushes {
            let list: Vec<String> = models.into_iter().collect();
            self.gateway.push_model_permission(&user_id, &list).await?;
        }
        for (user_id, flavor, enabled) in flag_pushes {
            push_flag(self.gateway.as_ref(), flavor, &user_id, enabled).await?;
        }
        let _ = removed;
        Ok(())
    }
}

fn department_members<'a>(
    dept_key: &str,
    employees: &'a [Employee],
    departments: &[Department],
) -> Result<Vec<&'a Employee>, PermissionError> {
    let dept = departments.iter().find(|d| d.key == dept_key);
    let members: Vec<&Employee> = match dept {
        Some(d) => employees.iter().filter(|e| d.contains_path(&e.department_path)).collect(),
        None => Vec::new(),
    };
    if members.is_empty() {
        return Err(PermissionError::DepartmentNotFound(dept_key.to_owned()));
    }
    Ok(members)
}

async fn effective_models(
    tx: &mut dyn Transaction,
    user_id: &str,
    chain: &[&Department],
) -> Result<BTreeSet<String>, PermissionError> {
    if let Some(entry) = tx.find_whitelist(Scope::User, user_id).await? {
        return Ok(entry.models);
    }
    for dept in chain {
        if let Some(entry) = tx.find_whitelist(Scope::Department, &dept.key).await? {
            return Ok(entry.models);
        }
    }
    Ok(BTreeSet::new())
}

async fn effective_check_flag(
    tx: &mut dyn Transaction,
    flavor: CheckFlavor,
    user_id: &str,
    chain: &[&Department],
) -> Result<bool, PermissionError> {
    if let Some(flag) = tx.find_check_flag(flavor, Scope::User, user_id).await?
        && let Some(v) = flag.state.resolved()
    {
        return Ok(v);
    }
    for dept in chain {
        if let Some(flag) = tx.find_check_flag(flavor, Scope::Department, &dept.key).await?
            && let Some(v) = flag.state.resolved()
        {
            return Ok(v);
        }
    }
    Ok(default_check_flag(flavor))
}

async fn push_flag(
    gateway: &dyn GatewayClient,
    flavor: CheckFlavor,
    user_id: &str,
    enabled: bool,
) -> Result<(), PermissionError> {
    match flavor {
        CheckFlavor::StarCheck => gateway.push_star_check(user_id, enabled).await?,
        CheckFlavor::QuotaCheck => gateway.push_quota_check(user_id, enabled).await?,
    }
    Ok(())
}
